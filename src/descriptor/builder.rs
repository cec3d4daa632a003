//! Incremental descriptor assembly on the write path

use std::sync::Arc;

use crate::config::{Compression, ContainerFormat};
use crate::error::{AtlasError, Result};
use crate::model::{ClusterId, ColumnId, EntryIndex, Model};

use super::cluster::{ByteRange, ClusterDescriptor, ColumnRange, PageInfo, PageRange};
use super::descriptor::Descriptor;

/// Grows a [`Descriptor`] one cluster at a time
///
/// Clusters must be recorded in id order. A freshly recorded cluster starts
/// with empty ranges for every column, positioned right after the previous
/// cluster's ranges; `record_page_range` then fills them in.
#[derive(Debug)]
pub struct DescriptorBuilder {
    descriptor: Descriptor,
}

impl DescriptorBuilder {
    pub fn new(
        name: &str,
        container_format: ContainerFormat,
        compression: Compression,
        model: Arc<Model>,
    ) -> Self {
        Self {
            descriptor: Descriptor::new(name, container_format, compression, model),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Id the next recorded cluster must carry
    pub fn next_cluster_id(&self) -> ClusterId {
        self.descriptor.n_clusters() as ClusterId
    }

    /// Append a cluster with empty column ranges
    pub fn record_cluster(
        &mut self,
        id: ClusterId,
        first_entry: EntryIndex,
        n_entries: u64,
        locator: ByteRange,
    ) -> Result<()> {
        if id != self.next_cluster_id() {
            return Err(AtlasError::WriteFailure(format!(
                "cluster {} recorded out of order, expected {}",
                id,
                self.next_cluster_id()
            )));
        }
        if first_entry != self.descriptor.n_entries() {
            return Err(AtlasError::WriteFailure(format!(
                "cluster {} starts at entry {}, expected {}",
                id,
                first_entry,
                self.descriptor.n_entries()
            )));
        }

        let n_columns = self.descriptor.model().n_columns();
        let previous = self.descriptor.clusters().last();
        let column_ranges = (0..n_columns)
            .map(|c| {
                let first_element_index = previous
                    .and_then(|p| p.column_ranges.get(c))
                    .map(|r| r.first_element_index + r.n_elements)
                    .unwrap_or(0);
                ColumnRange {
                    column: c as ColumnId,
                    first_element_index,
                    n_elements: 0,
                }
            })
            .collect();
        let page_ranges = (0..n_columns)
            .map(|c| PageRange::new(c as ColumnId, Vec::new()))
            .collect();

        self.descriptor.clusters_mut().push(ClusterDescriptor {
            id,
            first_entry,
            n_entries,
            locator,
            column_ranges,
            page_ranges,
        });
        self.descriptor.add_entries(n_entries);
        Ok(())
    }

    /// Attach the ordered pages of `column` to the last recorded cluster
    pub fn record_page_range(
        &mut self,
        id: ClusterId,
        column: ColumnId,
        page_infos: Vec<PageInfo>,
    ) -> Result<()> {
        let cluster = match self.descriptor.clusters_mut().last_mut() {
            Some(cluster) if cluster.id == id => cluster,
            _ => {
                return Err(AtlasError::WriteFailure(format!(
                    "page range for cluster {} which is not the open cluster",
                    id
                )))
            }
        };
        let c = column as usize;
        if c >= cluster.column_ranges.len() {
            return Err(AtlasError::WriteFailure(format!(
                "page range for unknown column {}",
                column
            )));
        }

        let range = PageRange::new(column, page_infos);
        cluster.column_ranges[c].n_elements = range.n_elements();
        cluster.page_ranges[c] = range;
        Ok(())
    }

    pub fn into_descriptor(self) -> Descriptor {
        self.descriptor
    }
}
