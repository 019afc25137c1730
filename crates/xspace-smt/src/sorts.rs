/// Sorts of declared variables. Inputs and neurons are all reals (QF_LRA).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Real,
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Real => write!(f, "Real"),
        }
    }
}
