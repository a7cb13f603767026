//! Shared fixtures for transport tests.

use rstest::fixture;

use super::super::*;

#[fixture]
pub fn base_config() -> SshConfig {
    SshConfig {
        ssh_bin: String::from("ssh"),
        scp_bin: String::from("scp"),
        ssh_user: String::from("root"),
        ssh_port: 22,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
        ssh_identity_file: Some(String::from("~/.ssh/id_rsa")),
    }
}

#[fixture]
pub fn master_host() -> RemoteHost {
    RemoteHost::new("10.109.0.2", 2222)
}
