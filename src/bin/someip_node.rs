use log::{error, info};
use someip_stack::codec::ReturnCode;
use someip_stack::message::MessageBuilder;
use someip_stack::runtime::SomeIpRuntime;
use someip_stack::service::{MethodHandler, Request};
use std::process::ExitCode;
use std::sync::Arc;

/// Method served by every configured service.
const ECHO_METHOD: u16 = 0x0001;

struct Echo;

impl MethodHandler for Echo {
    fn handle(&self, request: &Request<'_>, response: &mut MessageBuilder) -> ReturnCode {
        info!("echo {} bytes for {}", request.payload.len(), request.source);
        match response.put(request.payload) {
            Ok(()) => ReturnCode::Ok,
            Err(_) => ReturnCode::MalformedMessage,
        }
    }
}

fn main() -> ExitCode {
    someip_stack::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let (config_path, instance) = match args.as_slice() {
        [_, config, instance] => (config.as_str(), instance.as_str()),
        _ => {
            eprintln!("usage: someip_node <config.json> <instance>");
            return ExitCode::from(2);
        }
    };

    let rt = match SomeIpRuntime::load(config_path, instance) {
        Ok(rt) => rt,
        Err(e) => {
            error!("cannot start '{}': {}", instance, e);
            return ExitCode::FAILURE;
        }
    };

    let r = rt.clone();
    ctrlc::set_handler(move || {
        info!("shutting down...");
        r.stop();
    })
    .ok();

    let echo: Arc<dyn MethodHandler> = Arc::new(Echo);
    let mut aliases: Vec<&String> = rt.config().providing.keys().collect();
    aliases.sort();
    for alias in aliases {
        if let Err(e) = rt.offer_service(alias, vec![(ECHO_METHOD, echo.clone())]) {
            error!("cannot offer '{}': {}", alias, e);
        }
    }

    match rt.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("runtime failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
