//! Descriptor: schema + cluster index of one store

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::{Compression, ContainerFormat};
use crate::error::{AtlasError, Result};
use crate::model::{ClusterId, ColumnId, EntryIndex, Model};

use super::cluster::ClusterDescriptor;
use super::codec::{FooterRecord, HeaderRecord, FORMAT_VERSION};

/// Read/write metadata of one open store
///
/// The descriptor is the single source of truth for locating stored
/// values: every page is reached through a cluster's page range.
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    container_format: ContainerFormat,
    compression: Compression,
    model: Arc<Model>,
    clusters: Vec<ClusterDescriptor>,
    n_entries: u64,
}

impl Descriptor {
    pub(crate) fn new(
        name: &str,
        container_format: ContainerFormat,
        compression: Compression,
        model: Arc<Model>,
    ) -> Self {
        Self {
            name: name.to_string(),
            container_format,
            compression,
            model,
            clusters: Vec::new(),
            n_entries: 0,
        }
    }

    /// Assemble and validate a descriptor from its persisted records
    pub fn from_records(
        header: HeaderRecord,
        footer: FooterRecord,
        container_format: ContainerFormat,
    ) -> Result<Self> {
        if header.version != FORMAT_VERSION {
            return Err(AtlasError::CorruptDescriptor(format!(
                "unsupported header version {}",
                header.version
            )));
        }
        let model = Model::from_descriptors(header.fields, header.columns)?;

        let mut clusters = footer.clusters;
        for cluster in &mut clusters {
            for range in &mut cluster.page_ranges {
                range.rebuild_index();
            }
        }

        let descriptor = Self {
            name: header.name,
            container_format,
            compression: header.compression,
            model: Arc::new(model),
            clusters,
            n_entries: footer.n_entries,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container_format(&self) -> ContainerFormat {
        self.container_format
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Sum of all cluster entry counts
    pub fn n_entries(&self) -> u64 {
        self.n_entries
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn clusters(&self) -> &[ClusterDescriptor] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&ClusterDescriptor> {
        self.clusters.get(id as usize)
    }

    pub(crate) fn clusters_mut(&mut self) -> &mut Vec<ClusterDescriptor> {
        &mut self.clusters
    }

    pub(crate) fn add_entries(&mut self, n: u64) {
        self.n_entries += n;
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Cluster holding entry `entry`, O(log n)
    pub fn find_cluster_for_entry(&self, entry: EntryIndex) -> Option<ClusterId> {
        let pos = self.clusters.partition_point(|c| c.first_entry <= entry);
        let cluster = self.clusters.get(pos.checked_sub(1)?)?;
        cluster.contains_entry(entry).then_some(cluster.id)
    }

    /// Cluster holding global element `index` of `column`, O(log n)
    pub fn find_cluster_for_element(&self, column: ColumnId, index: u64) -> Option<ClusterId> {
        let pos = self.clusters.partition_point(|c| {
            c.column_range(column)
                .map(|r| r.first_element_index <= index)
                .unwrap_or(false)
        });
        let cluster = self.clusters.get(pos.checked_sub(1)?)?;
        cluster
            .column_range(column)?
            .contains(index)
            .then_some(cluster.id)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check cluster ordering and element-count consistency
    pub fn validate(&self) -> Result<()> {
        let n_columns = self.model.n_columns();
        let mut next_entry = 0u64;
        let mut next_element = vec![0u64; n_columns];

        for (i, cluster) in self.clusters.iter().enumerate() {
            let corrupt = |msg: String| {
                AtlasError::CorruptDescriptor(format!("cluster {}: {}", cluster.id, msg))
            };

            if cluster.id != i as ClusterId {
                return Err(corrupt(format!("out of order, expected id {}", i)));
            }
            if cluster.first_entry != next_entry {
                return Err(corrupt(format!(
                    "first entry {} does not follow previous cluster end {}",
                    cluster.first_entry, next_entry
                )));
            }
            if cluster.n_entries == 0 {
                return Err(corrupt("cluster has no entries".to_string()));
            }
            if cluster.column_ranges.len() != n_columns || cluster.page_ranges.len() != n_columns {
                return Err(corrupt(format!(
                    "{} column ranges / {} page ranges for {} columns",
                    cluster.column_ranges.len(),
                    cluster.page_ranges.len(),
                    n_columns
                )));
            }

            for column in self.model.columns() {
                let c = column.id as usize;
                let col_range = &cluster.column_ranges[c];
                let page_range = &cluster.page_ranges[c];

                if col_range.column != column.id || page_range.column != column.id {
                    return Err(corrupt(format!("range for column {} is misplaced", column.id)));
                }
                if col_range.first_element_index != next_element[c] {
                    return Err(corrupt(format!(
                        "column {} starts at element {}, expected {}",
                        column.id, col_range.first_element_index, next_element[c]
                    )));
                }
                if page_range.n_elements() != col_range.n_elements {
                    return Err(corrupt(format!(
                        "column {} pages hold {} elements, range says {}",
                        column.id,
                        page_range.n_elements(),
                        col_range.n_elements
                    )));
                }
                if column.depth == 0 && col_range.n_elements != cluster.n_entries {
                    return Err(corrupt(format!(
                        "column {} holds {} elements for {} entries",
                        column.id, col_range.n_elements, cluster.n_entries
                    )));
                }
                for info in &page_range.page_infos {
                    let size = column.element.size() as u64;
                    if info.locator.uncompressed_size as u64 != info.n_elements as u64 * size {
                        return Err(corrupt(format!(
                            "column {} page size {} does not match {} elements",
                            column.id, info.locator.uncompressed_size, info.n_elements
                        )));
                    }
                }
                next_element[c] = next_element[c]
                    .checked_add(col_range.n_elements)
                    .ok_or_else(|| corrupt(format!("column {} element count overflows", column.id)))?;
            }
            next_entry = next_entry
                .checked_add(cluster.n_entries)
                .ok_or_else(|| corrupt("entry count overflows".to_string()))?;
        }

        if next_entry != self.n_entries {
            return Err(AtlasError::CorruptDescriptor(format!(
                "clusters hold {} entries, footer says {}",
                next_entry, self.n_entries
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Printout
    // =========================================================================

    /// Human-readable overview of schema, clusters and pages
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Store '{}'", self.name);
        let _ = writeln!(
            out,
            "  format: {:?}, compression: {:?}",
            self.container_format, self.compression
        );
        let _ = writeln!(
            out,
            "  entries: {}, clusters: {}, columns: {}",
            self.n_entries,
            self.clusters.len(),
            self.model.n_columns()
        );

        let _ = writeln!(out, "Fields:");
        for field in self.model.fields() {
            let columns: Vec<String> = field.layout.columns().iter().map(|c| c.to_string()).collect();
            let _ = writeln!(
                out,
                "  [{}] {}: {} (columns {})",
                field.id,
                field.name,
                field.field_type.type_name(),
                columns.join(",")
            );
        }

        let _ = writeln!(out, "Clusters:");
        for cluster in &self.clusters {
            let _ = writeln!(
                out,
                "  #{} entries [{}, {}) pages {} bytes {}@{}",
                cluster.id,
                cluster.first_entry,
                cluster.first_entry + cluster.n_entries,
                cluster.n_pages(),
                cluster.locator.len,
                cluster.locator.position
            );
        }
        out
    }

    /// Detailed page listing of one cluster
    pub fn page_listing(&self, id: ClusterId) -> Option<String> {
        let cluster = self.cluster(id)?;
        let mut out = String::new();
        for range in &cluster.page_ranges {
            for (page_no, info) in range.page_infos.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  column {:>3} page {:>4}: {:>8} elements  {:>10}@{:<12} ({} unpacked)",
                    range.column,
                    page_no,
                    info.n_elements,
                    info.locator.bytes_on_storage,
                    info.locator.position,
                    info.locator.uncompressed_size
                );
            }
        }
        Some(out)
    }
}
