pub mod auto;
pub mod issue;
pub mod validator;
