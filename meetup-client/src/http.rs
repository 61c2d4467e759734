use crate::error::{Error, Result};
use std::time::Duration;
use surf::{Client, StatusCode};
use utils::surf_logging::SurfLogging;

pub(crate) struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Client shared by every outbound component.
pub fn http_client() -> Client {
    Client::new().with(SurfLogging)
}

/// GET `url` and read the whole body, bounded by `timeout`.
///
/// Any failure before the body is read is a transport error prefixed with
/// `context`.
pub(crate) async fn get(
    client: &Client,
    url: &str,
    timeout: Duration,
    context: &str,
) -> Result<HttpResponse> {
    let fetch = async {
        let mut res = client.get(url).await?;
        let body = res.body_string().await?;
        Ok::<_, surf::Error>(HttpResponse {
            status: res.status(),
            body,
        })
    };

    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(e)) => Err(Error::transport(context, e)),
        Err(_) => Err(Error::transport(
            context,
            format!("no response within {:?}", timeout),
        )),
    }
}
