//! Observation queries: a [`QueryPlan`] builder and the assembler that fills it from a
//! variable's qualifiers.

pub mod observation;
pub mod plan;

pub use observation::{
    AdminLevel, BASE_COLUMNS, ObservationRow, PlaceFilter, build_observation_plan,
};
pub use plan::{JoinClause, JoinFragment, JoinKind, Projection, QueryPlan, SqlFragment, SqlParam};
