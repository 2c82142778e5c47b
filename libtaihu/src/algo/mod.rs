pub mod evaluator;
pub mod feature;
pub mod score;
pub mod shape;
pub use evaluator::{HandEvaluator, WinContext};
pub use score::{SCORE_TABLE, TaiData};
pub use shape::SHAPE_TABLE;
