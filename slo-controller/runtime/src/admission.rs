use crate::{
    core::{self, Catalog},
    k8s::RpaasInstance,
};
use bytes::{Buf, Bytes};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::{core::DynamicObject, Resource, ResourceExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Validates the SLO class declared by instances before they are stored.
#[derive(Clone)]
pub struct Admission {
    catalog: Arc<Catalog>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

/// The admitted object, narrowed to the kinds this webhook validates.
#[derive(Debug, PartialEq)]
enum Admitted {
    Instance(RpaasInstance),
    Other,
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<Bytes>;

const INVALID_CLASS: &str = "Invalid SLO class";

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if !is_review_request(&req) {
            return Box::pin(future::ready(not_found()));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            json_response(admission.review(bytes))
        })
    }
}

impl Admission {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Answers a serialized review; malformed reviews are answered as invalid.
    fn review(&self, body: Bytes) -> AdmissionReview {
        let review: Review = match serde_json::from_reader(body.reader()) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return AdmissionResponse::invalid(error).into_review();
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                self.admit(req)
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        rsp.into_review()
    }

    fn admit(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let instance = match Admitted::from_request(req) {
            Admitted::Instance(instance) => instance,
            Admitted::Other => return rsp,
        };

        match core::classify(instance.tags(), &self.catalog) {
            Ok(_) => rsp,
            Err(error) => {
                info!(
                    ns = %instance.namespace().unwrap_or_default(),
                    name = %instance.name_any(),
                    %error,
                    "Denied",
                );
                rsp.deny(INVALID_CLASS)
            }
        }
    }
}

// === impl Admitted ===

impl Admitted {
    fn from_request(req: AdmissionRequest) -> Self {
        if !is_kind::<RpaasInstance>(&req) {
            return Self::Other;
        }

        // Deletions carry no object; there is nothing to validate.
        let Some(obj) = req.object else {
            return Self::Other;
        };
        // Classification reads metadata only; the spec belongs to the rpaas
        // operator and is not validated here.
        Self::Instance(RpaasInstance {
            metadata: obj.metadata,
            spec: Default::default(),
        })
    }
}

fn is_review_request<B>(req: &Request<B>) -> bool {
    req.method() == http::Method::POST && req.uri().path() == "/"
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(http::StatusCode::NOT_FOUND)
        .body(Body::default())
        .expect("not found response must be valid"))
}
