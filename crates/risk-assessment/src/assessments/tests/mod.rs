mod cleanup;
mod common;
mod drafts;
mod validation;
