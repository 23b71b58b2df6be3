#[path = "helpers/mod.rs"]
mod helpers;

#[path = "parser/mod.rs"]
mod parser;

#[path = "printer/mod.rs"]
mod printer;

#[path = "schema/mod.rs"]
mod schema;
