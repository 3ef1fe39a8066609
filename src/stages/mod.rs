pub mod stage0_classify;
pub mod stage1_synthesize;
pub mod stage2_reconcile;
pub mod stage3_render;

pub use stage0_classify::*;
pub use stage1_synthesize::*;
pub use stage2_reconcile::*;
pub use stage3_render::*;
