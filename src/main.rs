use std::net::TcpListener;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use ofp_qos::config::ControllerConfig;
use ofp_qos::ofp_controller::handle_client_connected;
use ofp_qos::qos_switch::QosSwitch;

fn run() -> ofp_qos::Result<()> {
    let config = ControllerConfig::from_env()?;
    let listener = TcpListener::bind(config.listen)?;
    let controller = Arc::new(QosSwitch::new(config.policy));
    info!(listen = %config.listen,
          priority_hosts = ?controller.policy().priority_hosts,
          queue = controller.policy().priority_queue,
          "controller listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let peer = stream.peer_addr()?;
        let controller = Arc::clone(&controller);
        thread::Builder::new()
            .name(format!("switch-{}", peer))
            .spawn(move || {
                let _span = info_span!("session", %peer).entered();
                info!("connection accepted");
                match handle_client_connected(&*controller, stream) {
                    Ok(()) => info!("session closed"),
                    Err(e) => warn!(error = %e, "session terminated"),
                }
            })?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "controller failed");
            ExitCode::FAILURE
        }
    }
}
