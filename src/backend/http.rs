//! REST client for the comic-translation API.

use std::io::Read;
use std::time::Duration;

use eframe::egui::pos2;
use serde::{Deserialize, Serialize};

use super::ShapeBackend;
use crate::error::ApiError;
use crate::fonts::FontInfo;
use crate::geometry::{BoundingBox, Point};
use crate::model::{BubbleText, FontColor, NewShape, PageRef, Shape, ShapeId, TextUpdate};

const USER_AGENT: &str = "bubble-annotate";
const MAX_FONT_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapePayload {
    id: u64,
    sequence_number: u32,
    bounding_box: [f32; 4],
    outline: Vec<[f32; 2]>,
    #[serde(flatten)]
    text: BubbleText,
}

impl TryFrom<ShapePayload> for Shape {
    type Error = ApiError;

    fn try_from(payload: ShapePayload) -> Result<Self, Self::Error> {
        let outline = payload.outline.iter().map(|[x, y]| pos2(*x, *y)).collect();
        // bounding_box on the wire is advisory; ours is recomputed from the outline
        Shape::new(
            ShapeId::Persisted(payload.id),
            payload.sequence_number,
            outline,
            payload.text,
        )
        .map_err(|e| ApiError::Decode(format!("shape {}: {}", payload.id, e)))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload<'a> {
    sequence_number: u32,
    bounding_box: [f32; 4],
    outline: Vec<[f32; 2]>,
    #[serde(flatten)]
    text: &'a BubbleText,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeometryPayload {
    bounding_box: [f32; 4],
    outline: Vec<[f32; 2]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TextPayload<'a> {
    translated_text: &'a str,
    font_size: Option<f32>,
    font_color: Option<FontColor>,
    font_id: Option<&'a str>,
}

fn wire_outline(outline: &[Point]) -> Vec<[f32; 2]> {
    outline.iter().map(|p| [p.x, p.y]).collect()
}

pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(20))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.into(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self.agent.request(method, &self.url(path));
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn shape_call(
        &self,
        id: u64,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<(), ApiError> {
        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => Err(ApiError::NotFound(ShapeId::Persisted(id))),
            Err(e) => Err(e.into()),
        }
    }
}

impl ShapeBackend for HttpBackend {
    fn list_shapes(&self, page: &PageRef) -> Result<Vec<Shape>, ApiError> {
        let payloads: Vec<ShapePayload> = self
            .request("GET", &format!("pages/{page}/bubbles"))
            .call()?
            .into_json()?;
        payloads.into_iter().map(Shape::try_from).collect()
    }

    fn create_shape(&self, page: &PageRef, shape: &NewShape) -> Result<Shape, ApiError> {
        let body = CreatePayload {
            sequence_number: shape.sequence_number,
            bounding_box: shape.bounding_box.to_array(),
            outline: wire_outline(&shape.outline),
            text: &shape.text,
        };
        let payload: ShapePayload = self
            .request("POST", &format!("pages/{page}/bubbles"))
            .send_json(body)?
            .into_json()?;
        tracing::info!(page = %page, id = payload.id, "bubble created");
        payload.try_into()
    }

    fn update_shape_geometry(
        &self,
        id: u64,
        outline: &[Point],
        bounding_box: BoundingBox,
    ) -> Result<(), ApiError> {
        let body = GeometryPayload {
            bounding_box: bounding_box.to_array(),
            outline: wire_outline(outline),
        };
        let result = self
            .request("PUT", &format!("bubbles/{id}/geometry"))
            .send_json(body);
        self.shape_call(id, result)
    }

    fn update_shape_text(&self, id: u64, update: &TextUpdate) -> Result<(), ApiError> {
        let body = TextPayload {
            translated_text: &update.translation,
            font_size: update.font_size,
            font_color: update.font_color,
            font_id: update.font_id.as_deref(),
        };
        let result = self.request("PUT", &format!("bubbles/{id}/text")).send_json(body);
        self.shape_call(id, result)
    }

    fn delete_shape(&self, id: u64) -> Result<(), ApiError> {
        let result = self.request("DELETE", &format!("bubbles/{id}")).call();
        self.shape_call(id, result)
    }

    fn list_fonts(&self) -> Result<Vec<FontInfo>, ApiError> {
        Ok(self.request("GET", "fonts").call()?.into_json()?)
    }

    fn fetch_font(&self, font: &FontInfo) -> Result<Vec<u8>, ApiError> {
        let source = font
            .source_url
            .as_deref()
            .ok_or_else(|| ApiError::Rejected(format!("font {} has no source", font.id)))?;
        let response = self.request("GET", source).call()?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FONT_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
