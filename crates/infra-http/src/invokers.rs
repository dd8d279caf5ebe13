// Resource invokers for the function and state machine services

use crate::endpoint::HttpEndpoint;
use async_trait::async_trait;
use tenantq_core::domain::Orid;
use tenantq_core::port::{InvocationError, ResourceInvoker};

/// Serverless function service: `POST {base}/v1/invoke/{orid}?async=true`
pub struct HttpFunctionInvoker {
    endpoint: HttpEndpoint,
}

impl HttpFunctionInvoker {
    pub fn new(endpoint: HttpEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ResourceInvoker for HttpFunctionInvoker {
    async fn invoke(&self, resource: &Orid, body: &str) -> Result<(), InvocationError> {
        let mut url = self.endpoint.url(&format!("v1/invoke/{resource}"))?;
        // Fire and forget: the function service acknowledges before running
        url.set_query(Some("async=true"));
        self.endpoint.post(url, body).await
    }
}

/// State machine service: `POST {base}/v1/machine/{orid}/invoke`
pub struct HttpStateMachineInvoker {
    endpoint: HttpEndpoint,
}

impl HttpStateMachineInvoker {
    pub fn new(endpoint: HttpEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ResourceInvoker for HttpStateMachineInvoker {
    async fn invoke(&self, resource: &Orid, body: &str) -> Result<(), InvocationError> {
        let url = self.endpoint.url(&format!("v1/machine/{resource}/invoke"))?;
        self.endpoint.post(url, body).await
    }
}

/// Stand-in for a service without a configured URL; every call fails
pub struct UnconfiguredInvoker {
    service: &'static str,
}

impl UnconfiguredInvoker {
    pub fn new(service: &'static str) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ResourceInvoker for UnconfiguredInvoker {
    async fn invoke(&self, _resource: &Orid, _body: &str) -> Result<(), InvocationError> {
        Err(InvocationError::NotConfigured(format!(
            "no endpoint configured for {} resources",
            self.service
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resource(text: &str) -> Orid {
        Orid::parse(text).unwrap()
    }

    fn endpoint(server: &MockServer, timeout: Duration) -> HttpEndpoint {
        HttpEndpoint::new(server.uri(), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_function_invocation_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoke/orid:1:orid:::1000:sf:fn"))
            .and(query_param("async", "true"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"a":1}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = HttpFunctionInvoker::new(endpoint(&server, Duration::from_secs(5)));
        invoker
            .invoke(&resource("orid:1:orid:::1000:sf:fn"), r#"{"a":1}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_state_machine_invocation_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/machine/orid:1:orid:::1000:sm:flow/invoke"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = HttpStateMachineInvoker::new(endpoint(&server, Duration::from_secs(5)));
        invoker
            .invoke(&resource("orid:1:orid:::1000:sm:flow"), "payload")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/invoke/orid:1:orid:::1000:sf:fn"))
            .respond_with(ResponseTemplate::new(500).set_body_string("nope"))
            .expect(1)
            .mount(&server)
            .await;

        let err = HttpFunctionInvoker::new(endpoint(&server, Duration::from_secs(5)))
            .invoke(&resource("orid:1:orid:::1000:sf:fn"), "x")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            InvocationError::Rejected {
                status: 500,
                body: "nope".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_service_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = HttpStateMachineInvoker::new(endpoint(&server, Duration::from_millis(100)))
            .invoke(&resource("orid:1:orid:::1000:sm:flow"), "x")
            .await
            .unwrap_err();
        assert_eq!(err, InvocationError::Timeout(100));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Nothing listens on the reserved port 1
        let endpoint = HttpEndpoint::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();

        let err = HttpFunctionInvoker::new(endpoint)
            .invoke(&resource("orid:1:orid:::1000:sf:fn"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_invoker_fails() {
        let err = UnconfiguredInvoker::new("sm")
            .invoke(&resource("orid:1:orid:::1000:sm:flow"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::NotConfigured(msg) if msg.contains("sm")));
    }
}
