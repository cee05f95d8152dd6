//! Predicate and class identifiers shared by the store, the qualifier resolver and the
//! metadata layer.

pub const LABEL: &str = "label";
pub const DESCRIPTION: &str = "description";
pub const INSTANCE_OF: &str = "P31";
pub const SHORT_NAME: &str = "P1813";
pub const URL: &str = "P2699";
pub const WIKIDATA_DATA_TYPE: &str = "wikidata_data_type";

/// Links an observation edge (by id) to its dataset node.
pub const DATASET: &str = "P2006020004";
/// Links a variable node to each of its qualifier properties.
pub const HAS_QUALIFIER: &str = "P2006020002";
/// Links a variable node to the property its observations use.
pub const CORRESPONDS_TO_PROPERTY: &str = "P1687";

pub const DATASET_CLASS: &str = "Q1172284";
pub const VARIABLE_CLASS: &str = "Q50701";

pub const POINT_IN_TIME: &str = "P585";
pub const STATED_IN: &str = "P248";
pub const LOCATED_IN: &str = "P131";
pub const LOCATION: &str = "P276";
pub const COUNTRY: &str = "P17";

pub const ADMIN1: &str = "P2006190001";
pub const ADMIN2: &str = "P2006190002";
pub const ADMIN3: &str = "P2006190003";
