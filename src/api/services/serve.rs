//! `/serve` 入口
//!
//! 一个路由按 `type` 参数分发：vast（默认）、rtb、track、click、health。
//! VAST 路径永远返回可解析的 XML，只有存储不可用时状态码才不是 200。

use std::sync::{Arc, LazyLock};

use actix_web::http::{Method, StatusCode};
use actix_web::{HttpRequest, HttpResponse, web};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use tracing::{debug, trace, warn};

use super::health::{AppStartTime, HealthService};
use crate::config::FeaturesConfig;
use crate::events::EventManager;
use crate::services::{ClientContext, RtbResponder, ServeError, ServeRequest, WaterfallSelector};
use crate::storage::AdStore;
use crate::storage::models::{EventSource, EventType, ImpressionEvent};
use crate::utils::ip::extract_client_ip;
use crate::utils::{generate_impression_id, truncate_chars};
use crate::vast::{VastDocument, error_document};

const MAX_USER_AGENT_CHARS: usize = 255;
const MAX_REFERER_CHARS: usize = 500;

/// 1x1 透明 GIF
static PIXEL_GIF: LazyLock<Vec<u8>> = LazyLock::new(|| {
    STANDARD
        .decode("R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7")
        .unwrap_or_default()
});

/// `/serve` 处理所需的全部依赖
pub struct ServeContext {
    pub waterfall: WaterfallSelector,
    pub rtb: RtbResponder,
    pub events: EventManager,
    pub store: Arc<dyn AdStore>,
    pub features: FeaturesConfig,
    pub caching: bool,
    pub start_time: AppStartTime,
}

/// 查询参数全部按字符串接收，非法值视为缺失；重复参数取第一次出现的值
#[derive(Debug, Default)]
struct ServeQuery {
    kind: Option<String>,
    zone_id: Option<String>,
    campaign_id: Option<String>,
    impression_id: Option<String>,
    video_player: Option<String>,
    player_id: Option<String>,
    event: Option<String>,
    redirect: Option<String>,
    url: Option<String>,
}

impl ServeQuery {
    fn from_request(req: &HttpRequest) -> Self {
        Self::parse(req.query_string())
    }

    fn parse(query_string: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
            let slot = match key.as_ref() {
                "type" => &mut query.kind,
                "zone_id" => &mut query.zone_id,
                "campaign_id" => &mut query.campaign_id,
                "impression_id" => &mut query.impression_id,
                "video_player" => &mut query.video_player,
                "player_id" => &mut query.player_id,
                "event" => &mut query.event,
                "redirect" => &mut query.redirect,
                "url" => &mut query.url,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    fn zone_id(&self) -> Option<i64> {
        parse_positive_id(self.zone_id.as_deref())
    }

    fn campaign_id(&self) -> Option<i64> {
        parse_positive_id(self.campaign_id.as_deref())
    }

    fn impression_id(&self) -> Option<&str> {
        non_empty(self.impression_id.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive_id(value: Option<&str>) -> Option<i64> {
    non_empty(value)
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
}

fn header_string(req: &HttpRequest, name: &str, max_chars: usize) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, max_chars))
}

fn client_context(req: &HttpRequest, video_player_id: Option<String>) -> ClientContext {
    ClientContext {
        user_ip: extract_client_ip(req),
        user_agent: header_string(req, "user-agent", MAX_USER_AGENT_CHARS),
        referer: header_string(req, "referer", MAX_REFERER_CHARS),
        video_player_id,
    }
}

fn vast_response(status: StatusCode, document: VastDocument) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header(("Content-Type", "application/xml; charset=utf-8"))
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .body(document.into_string())
}

fn pixel_response() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Content-Type", "image/gif"))
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate, private"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .body(PIXEL_GIF.clone())
}

/// 只接受绝对 http(s) 地址作为跳转目标
fn redirect_target(raw: Option<&str>) -> Option<String> {
    let raw = non_empty(raw)?;
    let parsed = url::Url::parse(raw).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

pub struct ServeService;

impl ServeService {
    pub async fn handle(
        req: HttpRequest,
        body: web::Bytes,
        ctx: web::Data<ServeContext>,
    ) -> HttpResponse {
        if req.method() == Method::OPTIONS {
            return HttpResponse::Ok().finish();
        }

        let query = ServeQuery::from_request(&req);
        let kind = non_empty(query.kind.as_deref()).unwrap_or("vast").to_string();
        trace!("Serve request type={}", kind);

        match kind.as_str() {
            "vast" => Self::handle_vast(&req, &query, &ctx).await,
            "rtb" => Self::handle_rtb(&body, &ctx).await,
            "track" => Self::handle_track(&req, &query, &ctx),
            "click" => Self::handle_click(&req, &query, &ctx),
            "health" => HealthService::health_check(&ctx).await,
            other => {
                debug!("Invalid request type: {}", other);
                vast_response(
                    StatusCode::OK,
                    error_document(&format!("Invalid request type: {}", other)),
                )
            }
        }
    }

    async fn handle_vast(req: &HttpRequest, query: &ServeQuery, ctx: &ServeContext) -> HttpResponse {
        let Some(zone_id) = query.zone_id() else {
            warn!(
                "VAST request missing zone_id from {}",
                extract_client_ip(req).unwrap_or_default()
            );
            return vast_response(
                StatusCode::OK,
                error_document(ServeError::MissingZoneId.player_message()),
            );
        };

        let video_player = non_empty(query.video_player.as_deref())
            .or_else(|| non_empty(query.player_id.as_deref()))
            .map(String::from);

        let request = ServeRequest {
            zone_id,
            impression_id: query
                .impression_id()
                .map(String::from)
                .unwrap_or_else(generate_impression_id),
            client: client_context(req, video_player),
        };

        let result = ctx.waterfall.serve(&request).await;
        let status = if result.is_store_outage() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };
        vast_response(status, result.into_document())
    }

    async fn handle_rtb(body: &[u8], ctx: &ServeContext) -> HttpResponse {
        if !ctx.features.rtb_enabled() {
            return HttpResponse::Forbidden()
                .json(serde_json::json!({ "error": "RTB service not available" }));
        }

        let response = ctx.rtb.build(body).await;
        HttpResponse::Ok().json(response)
    }

    /// 缺 zone_id 或 impression_id 时只返回像素，不记录
    fn handle_track(req: &HttpRequest, query: &ServeQuery, ctx: &ServeContext) -> HttpResponse {
        if let (Some(zone_id), Some(impression_id)) = (query.zone_id(), query.impression_id()) {
            let event_type = non_empty(query.event.as_deref())
                .map(EventType::parse)
                .unwrap_or(EventType::Impression);
            let client = client_context(req, None);

            ctx.events.record(ImpressionEvent {
                zone_id,
                campaign_id: query.campaign_id(),
                impression_id: impression_id.to_string(),
                event_type,
                source: Some(EventSource::Tracking),
                user_ip: client.user_ip,
                user_agent: client.user_agent,
                referer: client.referer,
                video_player_id: None,
                timestamp: Utc::now(),
            });
        } else {
            trace!("Tracking pixel without zone_id/impression_id, nothing recorded");
        }

        pixel_response()
    }

    fn handle_click(req: &HttpRequest, query: &ServeQuery, ctx: &ServeContext) -> HttpResponse {
        if let (Some(zone_id), Some(impression_id)) = (query.zone_id(), query.impression_id()) {
            ctx.events.record(ImpressionEvent {
                zone_id,
                campaign_id: query.campaign_id(),
                impression_id: impression_id.to_string(),
                event_type: EventType::Click,
                source: Some(EventSource::Click),
                user_ip: extract_client_ip(req),
                user_agent: None,
                referer: None,
                video_player_id: None,
                timestamp: Utc::now(),
            });
        }

        let raw = non_empty(query.redirect.as_deref()).or_else(|| non_empty(query.url.as_deref()));
        match redirect_target(raw) {
            Some(target) => HttpResponse::Found()
                .insert_header(("Location", target))
                .finish(),
            None => {
                if raw.is_some() {
                    debug!("Click redirect target rejected: {:?}", raw);
                }
                HttpResponse::NoContent().finish()
            }
        }
    }
}

/// Serve 路由配置
pub fn serve_routes() -> actix_web::Resource {
    web::resource("/serve")
        .route(web::get().to(ServeService::handle))
        .route(web::post().to(ServeService::handle))
        .route(web::method(Method::OPTIONS).to(ServeService::handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_id() {
        assert_eq!(parse_positive_id(Some("7")), Some(7));
        assert_eq!(parse_positive_id(Some(" 12 ")), Some(12));
        assert_eq!(parse_positive_id(Some("0")), None);
        assert_eq!(parse_positive_id(Some("-3")), None);
        assert_eq!(parse_positive_id(Some("abc")), None);
        assert_eq!(parse_positive_id(None), None);
    }

    #[test]
    fn test_query_keeps_first_duplicate() {
        let query = ServeQuery::parse("type=track&zone_id=7&impression_id=a&impression_id=b&x=1");
        assert_eq!(query.kind.as_deref(), Some("track"));
        assert_eq!(query.zone_id(), Some(7));
        assert_eq!(query.impression_id(), Some("a"));
    }

    #[test]
    fn test_query_decodes_values() {
        let query = ServeQuery::parse("type=click&url=https%3A%2F%2Fadv.example%2Fl%3Fa%3D1&zone_id=x");
        assert_eq!(query.kind.as_deref(), Some("click"));
        assert_eq!(query.url.as_deref(), Some("https://adv.example/l?a=1"));
        assert_eq!(query.zone_id(), None);
    }

    #[test]
    fn test_pixel_is_gif() {
        assert!(PIXEL_GIF.starts_with(b"GIF89a"));
        assert_eq!(PIXEL_GIF.len(), 42);
    }

    #[test]
    fn test_redirect_target() {
        assert_eq!(
            redirect_target(Some("https://adv.example/landing?a=1")).as_deref(),
            Some("https://adv.example/landing?a=1")
        );
        assert_eq!(redirect_target(Some("javascript:alert(1)")), None);
        assert_eq!(redirect_target(Some("/relative")), None);
        assert_eq!(redirect_target(Some("")), None);
    }
}
