// Retrieval module
// Turns a question embedding into ranked context chunks. Failures degrade to
// an empty context; callers treat "no context" as a prompt mode, not an error.


use tracing::{debug, error, info};

use crate::vector_store::{IndexHandle, QueryMatch};

/// Seam for the similarity query so the retriever and answer service can
/// take test doubles.
pub trait VectorQuerier {
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        property_filter: Option<&str>,
    ) -> crate::Result<Vec<QueryMatch>>;
}

impl VectorQuerier for IndexHandle {
    #[inline]
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        property_filter: Option<&str>,
    ) -> crate::Result<Vec<QueryMatch>> {
        IndexHandle::query(self, vector, top_k, property_filter)
    }
}

#[derive(Debug, Clone)]
pub struct Retriever<V> {
    index: V,
    top_k: usize,
}

impl<V: VectorQuerier> Retriever<V> {
    #[inline]
    pub fn new(index: V, top_k: usize) -> Self {
        Self { index, top_k }
    }

    /// Retrieve up to `top_k` context chunks for a question embedding,
    /// ordered by the store's similarity ranking.
    ///
    /// With a property filter only that property's records are searched;
    /// without one the whole index is searched. Matches lacking a `text`
    /// metadata field are dropped. Never raises: an absent embedding or a
    /// store failure yields an empty context.
    #[inline]
    pub fn retrieve(
        &self,
        embedding: Option<&[f32]>,
        property_filter: Option<&str>,
    ) -> Vec<String> {
        let Some(vector) = embedding else {
            error!("No query embedding provided for retrieval");
            return Vec::new();
        };

        match property_filter {
            Some(property_id) => {
                info!("Querying vector store with propertyId filter '{}'", property_id);
            }
            None => {
                info!("Querying vector store without propertyId filter (may return results from any property)");
            }
        }

        match self.index.query(vector, self.top_k, property_filter) {
            Ok(matches) => {
                debug!("Vector store returned {} matches", matches.len());
                matches
                    .into_iter()
                    .filter_map(|m| m.metadata.and_then(|metadata| metadata.text))
                    .collect()
            }
            Err(e) => {
                error!("Error querying vector store: {}", e);
                Vec::new()
            }
        }
    }
}
