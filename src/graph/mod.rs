//! Graph module: query building and result normalization.
//!
//! Provides the raw and normalized data model, the Cypher builder for each
//! tool, the query template catalogue, and the normalizer that turns store
//! values into plain JSON.

pub mod cypher;
pub mod normalize;
pub mod templates;
pub mod types;

pub use cypher::{BuildError, CypherQuery};
pub use normalize::{
    normalize, normalize_node, normalize_path, normalize_record, normalize_records,
    normalize_relationship, MAX_SAFE_INTEGER,
};
pub use templates::{Category, QueryTemplate, TemplateError};
pub use types::{
    Direction, GraphNode, GraphPath, GraphRelationship, LabelDescriptor, Neighborhood,
    RawNode, RawPath, RawRecord, RawRelationship, RawSegment, RawValue,
    RelationshipTypeDescriptor, SchemaSummary,
};
