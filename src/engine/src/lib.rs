pub mod dumper;
pub mod locator;
pub mod memory;
pub mod scanner;
pub mod signature;
pub mod stream;
