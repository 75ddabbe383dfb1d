pub const USAGE_SCM: &str = include_str!("usage.scm");
