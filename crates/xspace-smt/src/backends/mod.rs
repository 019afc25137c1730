pub mod process_backend;
pub mod smtlib_printer;
pub mod z3_backend;
