pub mod analyzer;
pub mod completion;
pub mod exam;
pub mod instructions;
pub mod learning;
pub mod prompts;
pub mod tutor;
pub mod understanding;
