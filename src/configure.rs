//! Post-provision setup run over the remote shell once a server is ready.
//!
//! The steps expose the container daemon on a TCP socket through systemd
//! socket activation. They run in order and stop at the first failure.

use shell_escape::unix::escape;
use tracing::{debug, info};

use crate::error::DriverError;
use crate::ssh::{RemoteShell, SshTarget};

/// TCP port the container daemon listens on after setup.
pub const DOCKER_PORT: u16 = 2375;

/// Location of the socket unit on the instance.
pub const SOCKET_UNIT_PATH: &str = "/etc/systemd/system/docker-tcp.socket";

/// One named remote command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SetupStep {
    /// Name reported when the step fails.
    pub name: &'static str,
    /// Command string passed to the remote shell.
    pub command: String,
}

/// Contents of the `docker-tcp.socket` unit.
#[must_use]
pub fn socket_unit() -> String {
    format!(
        "[Unit]\n\
         Description=Docker Socket for the API\n\
         \n\
         [Socket]\n\
         ListenStream={DOCKER_PORT}\n\
         BindIPv6Only=both\n\
         Service=docker.service\n\
         \n\
         [Install]\n\
         WantedBy=sockets.target\n"
    )
}

/// Ordered setup steps applied to every new server.
#[must_use]
pub fn setup_steps() -> Vec<SetupStep> {
    let unit = socket_unit();
    let install = format!(
        "printf %s {} | sudo tee {} >/dev/null",
        escape(unit.as_str().into()),
        escape(SOCKET_UNIT_PATH.into())
    );

    let enable = [
        "systemctl daemon-reload",
        "systemctl enable docker-tcp.socket",
        "systemctl stop docker",
        "systemctl start docker-tcp.socket",
        "systemctl start docker",
    ]
    .join(" && ");

    vec![
        SetupStep {
            name: "install-socket-unit",
            command: install,
        },
        SetupStep {
            name: "enable-service",
            command: format!("sudo sh -c {}", escape(enable.as_str().into())),
        },
    ]
}

/// Runs every setup step against `target`, stopping at the first failure.
///
/// # Errors
///
/// Returns [`DriverError::Shell`] when the remote shell cannot start and
/// [`DriverError::RemoteExecution`] naming the step that exited non-zero.
pub fn configure<S: RemoteShell + ?Sized>(shell: &S, target: &SshTarget) -> Result<(), DriverError> {
    for step in setup_steps() {
        debug!(step = step.name, host = %target.host, "running setup step");
        let output = shell.run(target, &step.command)?;
        if !output.is_success() {
            return Err(DriverError::RemoteExecution {
                step: step.name,
                status_text: output.status_text(),
                stderr: output.stderr.trim().to_owned(),
            });
        }
    }
    info!(host = %target.host, port = DOCKER_PORT, "container daemon exposed over TCP");
    Ok(())
}
