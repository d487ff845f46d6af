use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Address of the submitting client.
///
/// Proxies put the original client first in `X-Forwarded-For`, so its first
/// hop wins over `X-Real-IP` and the socket peer.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = header_value(parts, "x-forwarded-for")
            .and_then(|value| value.split(',').next().map(|hop| hop.trim().to_string()))
            .filter(|ip| !ip.is_empty())
        {
            return Ok(ClientIp(Some(ip)));
        }

        if let Some(ip) = header_value(parts, "x-real-ip")
            .map(|value| value.trim().to_string())
            .filter(|ip| !ip.is_empty())
        {
            return Ok(ClientIp(Some(ip)));
        }

        if let Ok(ConnectInfo(addr)) =
            ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await
        {
            return Ok(ClientIp(Some(addr.ip().to_string())));
        }

        Ok(ClientIp(None))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> ClientIp {
        let (mut parts, _) = request.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_for_first_hop() {
        let request = Request::builder()
            .header("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1, 10.0.0.2")
            .header("X-Real-IP", "10.0.0.9")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await, ClientIp(Some("203.0.113.7".to_string())));
    }

    #[tokio::test]
    async fn test_real_ip_fallback() {
        let request = Request::builder()
            .header("X-Real-IP", "198.51.100.4")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await, ClientIp(Some("198.51.100.4".to_string())));
    }

    #[tokio::test]
    async fn test_socket_peer_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(MockConnectInfo(SocketAddr::from(([192, 0, 2, 1], 40000))));

        assert_eq!(extract(request).await, ClientIp(Some("192.0.2.1".to_string())));
    }

    #[tokio::test]
    async fn test_no_address_available() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await, ClientIp(None));
    }
}
