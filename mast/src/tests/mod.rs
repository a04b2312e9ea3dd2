
// Parser tests
mod parser;


mod backends;
