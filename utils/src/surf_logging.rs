use log::{debug, warn};
use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response, Result};

/// Logs every outbound request issued through a surf [`Client`].
///
/// Query strings are left out of the log line since they carry API keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfLogging;

#[surf::utils::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> Result<Response> {
        let method = req.method();
        let target = redact(req.url());
        let start = Instant::now();

        debug!("{} {}", method, target);
        match next.run(req, client).await {
            Ok(res) => {
                debug!(
                    "{} {} -> {} ({:?})",
                    method,
                    target,
                    res.status(),
                    start.elapsed()
                );
                Ok(res)
            }
            Err(e) => {
                warn!("{} {} failed after {:?}: {}", method, target, start.elapsed(), e);
                Err(e)
            }
        }
    }
}

fn redact(url: &surf::Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}
