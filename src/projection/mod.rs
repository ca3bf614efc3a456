//! Forecast projections: variables rendered month by month from their
//! time segments, with distributions and breakdowns.
pub mod csv;
pub mod error;
pub mod frame;
pub mod month;
pub mod render;
pub mod segment;
pub mod variable;

pub use csv::render_projections_csv;
pub use error::ProjectionError;
pub use frame::{AssociatedBreakdown, Distribution, Frame, SubFrame};
pub use month::{get_months, month_diff};
pub use render::{render_projections, FrameRenderContext, VariableProjections};
pub use segment::{Breakdown, DistributionSource, GrowthType, TimeSegment};
pub use variable::{Actual, Variable, VariableType};
