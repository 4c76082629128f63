//! Trait abstractions for testability.
//!
//! The device controller and content router issue every SOAP call through
//! [`SoapTransport`], so tests can substitute a scripted transport and
//! assert on the exact action sequence without a device on the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::soap::{send_soap_request, SoapResult, SoapTarget};

/// Seam for outbound SOAP invocations.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    /// Invokes a SOAP action and returns the raw response body.
    async fn invoke(
        &self,
        target: &SoapTarget,
        action: &str,
        args: &[(&str, String)],
    ) -> SoapResult<String>;
}

/// Production transport backed by a shared `reqwest` client.
pub struct HttpSoapTransport {
    client: Client,
    timeout: Duration,
}

impl HttpSoapTransport {
    /// Creates a transport with the given client and per-call timeout.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SoapTransport for HttpSoapTransport {
    async fn invoke(
        &self,
        target: &SoapTarget,
        action: &str,
        args: &[(&str, String)],
    ) -> SoapResult<String> {
        send_soap_request(&self.client, target, action, args, self.timeout).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for controller and router tests.

    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::sonos::soap::SoapError;

    /// One recorded SOAP invocation: (action, args).
    pub type RecordedCall = (String, Vec<(String, String)>);

    /// Scripted response for one action invocation.
    pub enum Scripted {
        /// Succeed with the given body.
        Ok(String),
        /// Fail with a UPnP fault of the given code.
        Fault(u32),
    }

    /// Transport that records calls and replays scripted responses.
    ///
    /// Responses are matched per action name (FIFO within an action). An
    /// action with no script succeeds with an empty SOAP body.
    pub struct RecordingTransport {
        pub calls: Mutex<Vec<RecordedCall>>,
        scripts: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                scripts: Mutex::new(Vec::new()),
            }
        }

        /// Queues a scripted response for the next invocation of `action`.
        pub fn script(&self, action: &str, response: Scripted) {
            let mut scripts = self.scripts.lock();
            if let Some((_, queue)) = scripts.iter_mut().find(|(a, _)| a == action) {
                queue.push_back(response);
            } else {
                scripts.push((action.to_string(), VecDeque::from([response])));
            }
        }

        /// Returns the recorded action names, in invocation order.
        pub fn action_sequence(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(a, _)| a.clone()).collect()
        }

        /// Returns the recorded args of the nth call to `action`.
        pub fn args_of(&self, action: &str, nth: usize) -> Option<Vec<(String, String)>> {
            self.calls
                .lock()
                .iter()
                .filter(|(a, _)| a == action)
                .nth(nth)
                .map(|(_, args)| args.clone())
        }
    }

    #[async_trait]
    impl SoapTransport for RecordingTransport {
        async fn invoke(
            &self,
            _target: &SoapTarget,
            action: &str,
            args: &[(&str, String)],
        ) -> SoapResult<String> {
            self.calls.lock().push((
                action.to_string(),
                args.iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));

            let scripted = {
                let mut scripts = self.scripts.lock();
                scripts
                    .iter_mut()
                    .find(|(a, _)| a == action)
                    .and_then(|(_, queue)| queue.pop_front())
            };

            match scripted {
                Some(Scripted::Ok(body)) => Ok(body),
                Some(Scripted::Fault(code)) => Err(SoapError::Fault {
                    code,
                    description: format!("scripted fault {code}"),
                }),
                None => Ok(String::new()),
            }
        }
    }
}
