//! Provider adapters
//!
//! | Code        | Auth                 | Shaping                         |
//! |-------------|----------------------|---------------------------------|
//! | `LSAJAH2H`  | cached bearer token  | passthrough                     |
//! | `PAYDAH2H`  | API key header       | passthrough, id synthesized     |
//! | `TOPINH2H`  | API key header       | passthrough                     |
//! | `DOMPETH2H` | API key header       | wallet code lower-cased         |
//! | `ISIKH2H`   | basic auth           | wallet `{wallet}_{destination}` |

pub mod dompet;
pub mod isik;
pub mod linksaja;
pub mod payda;
pub mod topin;

pub use dompet::DompetProvider;
pub use isik::IsikProvider;
pub use linksaja::LinkSajaProvider;
pub use payda::PaydaProvider;
pub use topin::TopInProvider;

use std::sync::Arc;

use super::{H2hConfig, H2hProvider, ProviderError};
use crate::cache::CacheStore;

pub const LINKSAJA: &str = "LSAJAH2H";
pub const PAYDA: &str = "PAYDAH2H";
pub const TOPIN: &str = "TOPINH2H";
pub const DOMPET: &str = "DOMPETH2H";
pub const ISIK: &str = "ISIKH2H";

/// Build every configured provider
///
/// `cache` backs the LinkSaja token store.
pub fn build_all(
    config: &H2hConfig,
    cache: Arc<dyn CacheStore>,
) -> Result<Vec<Arc<dyn H2hProvider>>, ProviderError> {
    Ok(vec![
        Arc::new(LinkSajaProvider::new(config.linksaja.clone(), cache)?),
        Arc::new(PaydaProvider::new(config.payda.clone())?),
        Arc::new(TopInProvider::new(config.topin.clone())?),
        Arc::new(DompetProvider::new(config.dompet.clone())?),
        Arc::new(IsikProvider::new(config.isik.clone())?),
    ])
}
