pub mod variance_tk;
