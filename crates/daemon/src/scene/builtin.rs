// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in demonstration scenes (spec.md §4.4): `static_text` and `clock`.

use pixoo_driver::{Point, Rgba, TextAlign};

use super::{gate, BoxFuture, RenderOutcome, Scene, SceneContext, SceneError, SceneMetadata, SceneRequirements};

/// Renders a single line of text once, then re-renders only if its params
/// changed — a minimal scene used in tests and as a starting template.
pub struct StaticTextScene {
    metadata: SceneMetadata,
    requirements: SceneRequirements,
}

pub fn static_text_scene() -> StaticTextScene {
    StaticTextScene {
        metadata: SceneMetadata {
            id: "static_text".to_owned(),
            display_name: "Static Text".to_owned(),
            description: "Draws a single line of text from the `text` param.".to_owned(),
            timing: Default::default(),
            schedule: None,
        },
        requirements: SceneRequirements { needs_text_rendering: true, ..Default::default() },
    }
}

impl Scene for StaticTextScene {
    fn metadata(&self) -> &SceneMetadata {
        &self.metadata
    }

    fn requirements(&self) -> &SceneRequirements {
        &self.requirements
    }

    fn init<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<(), SceneError>> {
        Box::pin(async move {
            gate(ctx.driver.clear().await)?;
            Ok(())
        })
    }

    fn render<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<Option<RenderOutcome>, SceneError>> {
        Box::pin(async move {
            let text = ctx
                .params
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("hello")
                .to_owned();
            let color = Rgba::opaque(255, 255, 255);
            gate(ctx.driver.draw_text(&text, Point::new(0, 0), color, TextAlign::Left))?;
            ctx.touch_frame().await;
            // A static scene's single render is done once drawn (spec.md §9:
            // "a static scene is just one whose render returns null").
            Ok(None)
        })
    }

    fn cleanup<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = ctx.driver.clear().await;
        })
    }
}

/// Renders `HH:MM:SS`, re-rendering once a second.
pub struct ClockScene {
    metadata: SceneMetadata,
    requirements: SceneRequirements,
}

pub fn clock_scene() -> ClockScene {
    ClockScene {
        metadata: SceneMetadata {
            id: "clock".to_owned(),
            display_name: "Clock".to_owned(),
            description: "Digital clock, refreshed once per second.".to_owned(),
            timing: super::SceneTiming { adaptive_timing: true, scene_timeout_minutes: None },
            schedule: None,
        },
        requirements: SceneRequirements { needs_text_rendering: true, ..Default::default() },
    }
}

impl Scene for ClockScene {
    fn metadata(&self) -> &SceneMetadata {
        &self.metadata
    }

    fn requirements(&self) -> &SceneRequirements {
        &self.requirements
    }

    fn init<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<(), SceneError>> {
        Box::pin(async move {
            gate(ctx.driver.clear().await)?;
            Ok(())
        })
    }

    fn render<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, Result<Option<RenderOutcome>, SceneError>> {
        Box::pin(async move {
            let total_seconds = ctx.now_ms / 1000;
            let text = format!(
                "{:02}:{:02}:{:02}",
                (total_seconds / 3600) % 24,
                (total_seconds / 60) % 60,
                total_seconds % 60
            );
            gate(ctx.driver.clear().await)?;
            gate(ctx.driver.draw_text(&text, Point::new(0, 0), Rgba::opaque(0, 255, 0), TextAlign::Center))?;
            ctx.touch_frame().await;
            Ok(Some(RenderOutcome::after(1_000)))
        })
    }

    fn cleanup<'a>(&'a self, ctx: &'a SceneContext) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = ctx.driver.clear().await;
        })
    }
}
