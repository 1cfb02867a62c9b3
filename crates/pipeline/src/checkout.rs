//! Checkout-session creation seam.
//!
//! The storefront component creates checkout sessions; this pipeline only
//! consumes the webhooks those sessions eventually produce. The trait lives
//! here so both sides agree on the contract without the pipeline depending on
//! any provider SDK.

/// A created checkout session the storefront redirects the buyer to.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub url: String,
}

pub trait CheckoutSessions {
    fn create_checkout_session(
        &self,
        price_id: &str,
        success_url: &str,
        cancel_url: &str,
        plan_id: &str,
        product_name: &str,
    ) -> impl std::future::Future<Output = Result<CheckoutSession, String>> + Send;
}
