//! CLI help specs

use crate::prelude::*;

#[test]
fn help_lists_flags() {
    kld()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--listen"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--default-expire-ms"))
        .stdout(predicate::str::contains("--pid-file"));
}

#[test]
fn version_is_reported() {
    kld()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("kld "));
}
