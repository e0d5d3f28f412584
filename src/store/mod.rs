pub mod resolver;
pub mod rewriter;
pub mod scanner;
