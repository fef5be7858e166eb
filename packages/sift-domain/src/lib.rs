pub mod field;
pub mod item;
pub mod query;
pub mod vector;
pub mod weights;

pub use field::{ContentField, ContentFields};
pub use item::{ItemStatus, UploadItem};
pub use query::{QueryError, validate_query};
pub use vector::{VectorError, is_degenerate, validate_vector};
pub use weights::{FieldWeights, UNIFORM_WEIGHT, WeightError, WeightProfile};
