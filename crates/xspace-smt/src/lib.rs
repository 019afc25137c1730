#![doc = include_str!("../README.md")]

//! SMT terms and solver integration for explanation search.
//!
//! Networks and explanation bounds are encoded over QF_LRA. Backends run
//! either in-process (Z3) or as SMT-LIB2 child processes (cvc5, z3, OpenSMT).

pub mod backends;
pub mod sexpr;
pub mod solver;
pub mod sorts;
pub mod terms;
