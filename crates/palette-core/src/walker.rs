//! Depth-first discovery of components in the document tree.
//!
//! Every node is classified once through [`NodeKind`]; component sets are
//! reduced according to the [`VariantPolicy`]. A node the host fails to
//! describe is recorded as a scan failure and its subtree skipped, the rest of
//! the walk continues.

use crate::config::PaletteConfig;
use crate::error::PaletteError;
use crate::host::{DocumentHost, NodeId, NodeInfo, NodeKind};
use crate::types::{ComponentRecord, RecordKind};
use tracing::{debug, warn};

/// How component sets and their variants become records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantPolicy {
    /// Represent each set by its default variant only.
    pub only_default_variants: bool,
    /// Without reduction, also emit a record for the set node itself.
    pub include_set_records: bool,
}

impl From<&PaletteConfig> for VariantPolicy {
    fn from(config: &PaletteConfig) -> Self {
        Self {
            only_default_variants: config.only_default_variants,
            include_set_records: config.include_set_records,
        }
    }
}

/// Records found by a walk, plus the subtrees that had to be skipped.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<ComponentRecord>,
    pub failures: Vec<PaletteError>,
}

impl ScanReport {
    pub fn extend(&mut self, other: ScanReport) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }
}

/// The set a node is a direct variant of.
struct EnclosingSet {
    id: NodeId,
    default_variant: Option<NodeId>,
}

pub struct TreeWalker<'a> {
    host: &'a dyn DocumentHost,
    policy: VariantPolicy,
}

impl<'a> TreeWalker<'a> {
    pub fn new(host: &'a dyn DocumentHost, policy: VariantPolicy) -> Self {
        Self { host, policy }
    }

    /// Walk `root` and its whole subtree.
    pub fn scan(&self, root: &NodeId) -> ScanReport {
        let mut report = ScanReport::default();
        let enclosing = self.enclosing_set_of(root);
        self.visit(root, enclosing.as_ref(), &mut report);
        debug!(
            "Scanned {}: {} records, {} skipped subtrees",
            root,
            report.records.len(),
            report.failures.len()
        );
        report
    }

    /// A scan may start at a variant; look at its parent to know.
    fn enclosing_set_of(&self, root: &NodeId) -> Option<EnclosingSet> {
        let info = self.host.inspect(root).ok()?;
        if info.kind != NodeKind::Component {
            return None;
        }
        let parent = self.host.inspect(info.parent.as_ref()?).ok()?;
        match parent.kind {
            NodeKind::ComponentSet { .. } => Some(EnclosingSet {
                default_variant: parent.default_variant().cloned(),
                id: parent.id,
            }),
            NodeKind::Component | NodeKind::Other => None,
        }
    }

    fn visit(&self, id: &NodeId, enclosing: Option<&EnclosingSet>, report: &mut ScanReport) {
        let info = match self.host.inspect(id) {
            Ok(info) => info,
            Err(e) => {
                warn!("Skipping subtree {} during scan: {}", id, e);
                report.failures.push(PaletteError::Scan {
                    node_id: id.to_string(),
                    message: e.message,
                });
                return;
            }
        };

        let as_enclosing = match &info.kind {
            NodeKind::ComponentSet { .. } => {
                self.emit_set(&info, report);
                Some(EnclosingSet {
                    id: info.id.clone(),
                    default_variant: info.default_variant().cloned(),
                })
            }
            NodeKind::Component => {
                self.emit_component(&info, enclosing, report);
                None
            }
            NodeKind::Other => None,
        };

        for child in &info.children {
            self.visit(child, as_enclosing.as_ref(), report);
        }
    }

    fn emit_set(&self, set: &NodeInfo, report: &mut ScanReport) {
        if !self.policy.only_default_variants {
            if self.policy.include_set_records {
                let mut record =
                    ComponentRecord::local(set.id.as_str(), &set.name, RecordKind::LocalComponentSet);
                record.description = set.description.clone();
                report.records.push(record);
            }
            return;
        }

        let Some(default_id) = set.default_variant() else {
            debug!("Component set {} has no variants", set.id);
            return;
        };
        match self.host.inspect(default_id) {
            Ok(variant) => {
                let mut record =
                    ComponentRecord::local(variant.id.as_str(), &variant.name, RecordKind::LocalComponent)
                        .with_variant_of(set.id.as_str(), true);
                record.description = variant.description;
                report.records.push(record);
            }
            Err(e) => {
                warn!(
                    "Default variant {} of set {} could not be read: {}",
                    default_id, set.id, e
                );
                report.failures.push(PaletteError::Scan {
                    node_id: default_id.to_string(),
                    message: e.message,
                });
            }
        }
    }

    fn emit_component(
        &self,
        component: &NodeInfo,
        enclosing: Option<&EnclosingSet>,
        report: &mut ScanReport,
    ) {
        let record =
            ComponentRecord::local(component.id.as_str(), &component.name, RecordKind::LocalComponent);
        let record = match enclosing {
            // Already represented by the set's default-variant record.
            Some(_) if self.policy.only_default_variants => return,
            Some(set) => {
                let is_default = set.default_variant.as_ref() == Some(&component.id);
                record.with_variant_of(set.id.as_str(), is_default)
            }
            None => record,
        };
        report.records.push(ComponentRecord {
            description: component.description.clone(),
            ..record
        });
    }
}
