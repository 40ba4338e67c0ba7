//! Authenticated requests and diagnostics shared by every pipeline stage

use crate::credentials::Netrc;
use crate::error::CacheFsResult;
use crate::options::{FsOptions, LogSink};
use crate::transport::{Request, Response, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Issues requests to mirrors and routes diagnostics to the configured sinks
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    netrc: Option<Netrc>,
    debug_sink: Option<LogSink>,
    error_sink: Option<LogSink>,
}

impl Client {
    pub fn new(options: &FsOptions) -> Self {
        Self {
            transport: options.build_transport(),
            netrc: options.netrc.clone(),
            debug_sink: options.debug_sink.clone(),
            error_sink: options.error_sink.clone(),
        }
    }

    /// GET a URL, attaching credentials for its host when known
    pub fn get(&self, url: Url) -> CacheFsResult<Response> {
        self.debug_log("HTTP Request", &["GET", url.as_str()]);

        let mut request = Request::get(url);
        let machine = self
            .netrc
            .as_ref()
            .zip(request.url.host_str())
            .and_then(|(netrc, host)| netrc.machine(host));
        if let Some(machine) = machine {
            request = request.with_basic_auth(
                machine.login.as_deref().unwrap_or_default(),
                machine.password.as_deref().unwrap_or_default(),
            );
        }

        Ok(self.transport.send(&request)?)
    }

    /// Space-joined message to the debug sink
    pub fn debug_log(&self, msg: &str, values: &[&str]) {
        let line = std::iter::once(msg)
            .chain(values.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("{}", line);
        if let Some(sink) = &self.debug_sink {
            sink(&line);
        }
    }

    /// `<op>: <error>` to the error sink
    pub fn error_log(&self, op: &str, err: &dyn fmt::Display) {
        let line = format!("{}: {}", op, err);
        debug!("{}", line);
        if let Some(sink) = &self.error_sink {
            sink(&line);
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("netrc", &self.netrc.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use std::sync::Mutex;

    struct RecordHeaders(Mutex<Vec<Option<String>>>);

    impl Transport for RecordHeaders {
        fn send(&self, request: &Request) -> Result<Response, TransportError> {
            self.0
                .lock()
                .unwrap()
                .push(request.header("authorization").map(str::to_string));
            Ok(Response::ok(Box::new(std::io::empty())))
        }
    }

    #[test]
    fn credentials_attached_per_host() {
        let recorder = Arc::new(RecordHeaders(Mutex::new(Vec::new())));
        let options = FsOptions::default()
            .with_transport(Arc::clone(&recorder))
            .with_netrc("machine cache.example.org login alice password s3cret");
        let client = Client::new(&options);

        client
            .get(Url::parse("https://cache.example.org/nix-cache-info").unwrap())
            .unwrap();
        client
            .get(Url::parse("https://other.example.org/nix-cache-info").unwrap())
            .unwrap();

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen[0].as_deref(), Some("Basic YWxpY2U6czNjcmV0"));
        assert_eq!(seen[1], None);
    }

    #[test]
    fn sinks_receive_formatted_lines() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let debug_lines = Arc::clone(&lines);
        let error_lines = Arc::clone(&lines);
        let options = FsOptions::default()
            .with_transport(RecordHeaders(Mutex::new(Vec::new())))
            .with_debug_sink(move |m| debug_lines.lock().unwrap().push(format!("debug {}", m)))
            .with_error_sink(move |m| error_lines.lock().unwrap().push(format!("error {}", m)));
        let client = Client::new(&options);

        client.debug_log("getNarInfo", &["/nix/store/abc-x"]);
        client.error_log("OpenFile", &"boom");

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], "debug getNarInfo /nix/store/abc-x");
        assert_eq!(lines[1], "error OpenFile: boom");
    }
}
