// chemistry module
pub mod chemistry {
    pub mod alphabet;
    pub mod elements;
    pub mod formula;
}

// algorithm module
pub mod algorithm {
    pub mod cache;
    pub mod decomposer;
    pub mod service;
    pub mod validator;
}

// data module
pub mod data {
    pub mod deviation;
    pub mod interval;
}

pub mod error;
