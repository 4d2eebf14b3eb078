pub mod predict;
pub mod run;
pub mod update;
