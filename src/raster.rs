use crate::canvas::{CardScene, Command, Shadow, TextAlign, TextBaseline};
use crate::error::TextCardError;
use crate::font::{FontRegistry, layout_glyphs};
use crate::style::FontDescriptor;
use crate::types::{Color, LinearShading, Px, ShadingStop};
use tiny_skia::{
    FillRule, GradientStop, LinearGradient, Mask, Paint, Path, PathBuilder, Pixmap, Point, Rect,
    SpreadMode, Stroke, Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

#[derive(Clone)]
struct RasterState {
    fill_color: Color,
    opacity: f32,
    font: Option<FontDescriptor>,
    shadow: Option<Shadow>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            opacity: 1.0,
            font: None,
            shadow: None,
        }
    }
}

/// Rasterizes a scene and encodes it as PNG. Failures are reported against
/// `page_index` and affect only that card.
pub(crate) fn scene_to_png(
    scene: &CardScene,
    page_index: usize,
    registry: Option<&FontRegistry>,
) -> Result<Vec<u8>, TextCardError> {
    let pixmap = rasterize(scene, page_index, registry)?;
    pixmap
        .encode_png()
        .map_err(|e| TextCardError::RenderFailure {
            page_index,
            message: format!("png encode failed: {e}"),
        })
}

pub(crate) fn rasterize(
    scene: &CardScene,
    page_index: usize,
    registry: Option<&FontRegistry>,
) -> Result<Pixmap, TextCardError> {
    let (width_px, height_px) =
        scene
            .size
            .to_pixels()
            .map_err(|err| TextCardError::RenderFailure {
                page_index,
                message: err.to_string(),
            })?;
    let mut pixmap =
        Pixmap::new(width_px, height_px).ok_or_else(|| TextCardError::RenderFailure {
            page_index,
            message: format!("could not allocate a {width_px}x{height_px} surface"),
        })?;
    pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

    let mut state = RasterState::default();
    let mut stack: Vec<RasterState> = Vec::new();
    let mut path_builder = PathBuilder::new();
    let mut has_path = false;

    for command in &scene.commands {
        match command {
            Command::SaveState => stack.push(state.clone()),
            Command::RestoreState => {
                if let Some(prev) = stack.pop() {
                    state = prev;
                }
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetOpacity(opacity) => state.opacity = opacity.clamp(0.0, 1.0),
            Command::SetFont(font) => state.font = Some(font.clone()),
            Command::SetShadow(shadow) => state.shadow = Some(*shadow),
            Command::ClearShadow => state.shadow = None,
            Command::ShadingFill(shading) => {
                draw_shading_fill(&mut pixmap, shading, state.opacity);
            }
            Command::MoveTo { x, y } => {
                path_builder.move_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::LineTo { x, y } => {
                path_builder.line_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::QuadTo { x1, y1, x, y } => {
                path_builder.quad_to(x1.to_f32(), y1.to_f32(), x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::ClosePath => {
                path_builder.close();
            }
            Command::Fill => {
                if let Some(path) = take_path(&mut path_builder, &mut has_path) {
                    fill_with_shadow(&mut pixmap, &state, &path);
                }
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let Some(rect) =
                    Rect::from_xywh(x.to_f32(), y.to_f32(), width.to_f32(), height.to_f32())
                else {
                    continue;
                };
                let path = PathBuilder::from_rect(rect);
                fill_with_shadow(&mut pixmap, &state, &path);
            }
            Command::DrawString {
                x,
                y,
                text,
                align,
                baseline,
            } => {
                draw_string(
                    &mut pixmap,
                    &state,
                    *x,
                    *y,
                    text,
                    *align,
                    *baseline,
                    registry,
                );
            }
        }
    }

    Ok(pixmap)
}

fn fill_with_shadow(pixmap: &mut Pixmap, state: &RasterState, path: &Path) {
    if let Some(shadow) = state.shadow.as_ref() {
        draw_shadow(pixmap, path, shadow, state.opacity);
    }
    let paint = fill_paint(state.fill_color, state.opacity);
    pixmap.fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
}

/// Paints the blurred, offset silhouette of `path` in the shadow color.
fn draw_shadow(pixmap: &mut Pixmap, path: &Path, shadow: &Shadow, opacity: f32) {
    let Some(mut mask) = Mask::new(pixmap.width(), pixmap.height()) else {
        return;
    };
    let offset = Transform::from_translate(shadow.offset_x.to_f32(), shadow.offset_y.to_f32());
    mask.fill_path(path, FillRule::Winding, true, offset);

    // Canvas shadow blur values are twice the gaussian sigma.
    let sigma = shadow.blur.to_f32().max(0.0) / 2.0;
    let bounds = path.bounds();
    blur_mask_region(
        &mut mask,
        sigma,
        bounds.left() + shadow.offset_x.to_f32(),
        bounds.top() + shadow.offset_y.to_f32(),
        bounds.right() + shadow.offset_x.to_f32(),
        bounds.bottom() + shadow.offset_y.to_f32(),
    );

    let Some(full) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
    else {
        return;
    };
    let paint = fill_paint(shadow.color, shadow.opacity * opacity);
    pixmap.fill_rect(full, &paint, Transform::identity(), Some(&mask));
}

pub(crate) fn gaussian_kernel(sigma: f32) -> (Vec<f32>, usize) {
    let radius = (sigma.abs() * 3.0).ceil() as usize;
    if radius == 0 {
        return (Vec::new(), 0);
    }

    let mut kernel = Vec::with_capacity(radius * 2 + 1);
    let sigma_sq = sigma * sigma;
    let mut sum = 0.0;
    for i in 0..=radius * 2 {
        let x = i as f32 - radius as f32;
        let value = (-x * x / (2.0 * sigma_sq)).exp();
        kernel.push(value);
        sum += value;
    }
    if sum != 0.0 {
        for k in &mut kernel {
            *k /= sum;
        }
    }
    (kernel, radius)
}

/// Separable gaussian blur of the mask's coverage, limited to the given
/// bounds grown by the kernel radius. Coverage outside that area is zero
/// before and after the blur.
fn blur_mask_region(mask: &mut Mask, sigma: f32, left: f32, top: f32, right: f32, bottom: f32) {
    let (kernel, radius) = gaussian_kernel(sigma);
    if kernel.is_empty() {
        return;
    }
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    if width == 0 || height == 0 {
        return;
    }
    let clamp_x = |v: f32| (v.floor().max(0.0) as usize).min(width);
    let clamp_y = |v: f32| (v.floor().max(0.0) as usize).min(height);
    let x0 = clamp_x(left - radius as f32 - 1.0);
    let x1 = clamp_x(right + radius as f32 + 2.0);
    let y0 = clamp_y(top - radius as f32 - 1.0);
    let y1 = clamp_y(bottom + radius as f32 + 2.0);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let data = mask.data_mut();
    let region_w = x1 - x0;
    let region_h = y1 - y0;
    let mut temp = vec![0.0f32; region_w * region_h];

    // Horizontal pass; samples past the region edge are zero coverage.
    for y in y0..y1 {
        for x in x0..x1 {
            let mut accum = 0.0;
            for (i, weight) in kernel.iter().enumerate() {
                let sx = x as isize + i as isize - radius as isize;
                if sx < 0 || sx >= width as isize {
                    continue;
                }
                accum += data[y * width + sx as usize] as f32 * weight;
            }
            temp[(y - y0) * region_w + (x - x0)] = accum;
        }
    }

    // Vertical pass.
    for y in y0..y1 {
        for x in x0..x1 {
            let mut accum = 0.0;
            for (i, weight) in kernel.iter().enumerate() {
                let sy = y as isize + i as isize - radius as isize;
                if sy < y0 as isize || sy >= y1 as isize {
                    continue;
                }
                accum += temp[(sy as usize - y0) * region_w + (x - x0)] * weight;
            }
            data[y * width + x] = accum.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn draw_shading_fill(pixmap: &mut Pixmap, shading: &LinearShading, opacity: f32) {
    let Some(rect) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
    else {
        return;
    };
    let start = Point::from_xy(shading.x0, shading.y0);
    let end = Point::from_xy(shading.x1, shading.y1);
    let stops = shading_stops(&shading.stops, opacity);
    let Some(shader) =
        LinearGradient::new(start, end, stops, SpreadMode::Pad, Transform::identity())
    else {
        return;
    };
    let mut paint = Paint::default();
    paint.shader = shader;
    paint.anti_alias = true;
    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
}

fn shading_stops(stops: &[ShadingStop], opacity: f32) -> Vec<GradientStop> {
    if stops.is_empty() {
        return vec![
            GradientStop::new(0.0, to_sk_color(Color::WHITE, opacity)),
            GradientStop::new(1.0, to_sk_color(Color::WHITE, opacity)),
        ];
    }
    stops
        .iter()
        .map(|stop| GradientStop::new(stop.offset.clamp(0.0, 1.0), to_sk_color(stop.color, opacity)))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn draw_string(
    pixmap: &mut Pixmap,
    state: &RasterState,
    x: Px,
    y: Px,
    text: &str,
    align: TextAlign,
    baseline: TextBaseline,
    registry: Option<&FontRegistry>,
) {
    let Some(font) = state.font.as_ref() else {
        return;
    };
    let font_size = font.size.to_f32();
    if font_size <= 0.0 || text.is_empty() {
        return;
    }
    let Some((registry, resolved)) =
        registry.and_then(|registry| registry.resolve(font).map(|resolved| (registry, resolved)))
    else {
        tracing::debug!(family = %font.family, "no font available for text");
        return;
    };
    let Ok(face) = ttf_parser::Face::parse(&resolved.font.data, 0) else {
        return;
    };

    let units_per_em = face.units_per_em().max(1) as f32;
    let origin_y = match baseline {
        TextBaseline::Alphabetic => y.to_f32(),
        TextBaseline::Top => y.to_f32() + face.ascender() as f32 / units_per_em * font_size,
    };
    let run = layout_glyphs(&resolved.font.data, text, font_size, registry.shapes_text());
    let origin_x = match align {
        TextAlign::Left => x.to_f32(),
        TextAlign::Center => x.to_f32() - run.advance / 2.0,
        TextAlign::Right => x.to_f32() - run.advance,
    };

    let paint = fill_paint(state.fill_color, state.opacity);
    let stroke = resolved.synthetic_bold.then(|| Stroke {
        width: (font_size / 30.0).max(0.5),
        ..Stroke::default()
    });
    for placement in run.placements {
        let mut builder = GlyphPathBuilder::new(
            origin_x + placement.offset_x,
            origin_y - placement.offset_y,
            placement.scale,
        );
        if face
            .outline_glyph(GlyphId(placement.glyph_id), &mut builder)
            .is_none()
        {
            continue;
        }
        let Some(path) = builder.finish() else {
            continue;
        };
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        if let Some(stroke) = stroke.as_ref() {
            pixmap.stroke_path(&path, &paint, stroke, Transform::identity(), None);
        }
    }
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn px(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.px(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x, y) = self.px(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.px(x1, y1);
        let (x2, y2) = self.px(x2, y2);
        let (x, y) = self.px(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn take_path(path_builder: &mut PathBuilder, has_path: &mut bool) -> Option<Path> {
    if !*has_path {
        return None;
    }
    *has_path = false;
    let builder = std::mem::replace(path_builder, PathBuilder::new());
    builder.finish()
}

fn fill_paint(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color, opacity));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color, opacity: f32) -> tiny_skia::Color {
    let r = color.r.clamp(0.0, 1.0);
    let g = color.g.clamp(0.0, 1.0);
    let b = color.b.clamp(0.0, 1.0);
    let a = opacity.clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba(r, g, b, a)
        .unwrap_or_else(|| tiny_skia::Color::from_rgba8(0, 0, 0, 255))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::{Rect as CardRect, Size};

    fn decode(png: &[u8]) -> image::RgbaImage {
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    fn rect(x: i32, y: i32, w: i32, h: i32) -> CardRect {
        CardRect {
            x: Px::from_i32(x),
            y: Px::from_i32(y),
            width: Px::from_i32(w),
            height: Px::from_i32(h),
        }
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        let (kernel, radius) = gaussian_kernel(5.0);
        assert_eq!(radius, 15);
        assert_eq!(kernel.len(), 31);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(kernel[15] > kernel[0]);
        assert!(gaussian_kernel(0.0).0.is_empty());
    }

    #[test]
    fn flat_rect_fill_matches_color() {
        let mut canvas = Canvas::new(Size::new(20.0, 10.0));
        canvas.set_fill_color(Color::rgb8(0x1E, 0x1E, 0x1E));
        canvas.draw_rect(rect(0, 0, 20, 10));
        let png = scene_to_png(&canvas.finish(), 0, None).unwrap();
        let img = decode(&png);
        assert_eq!((img.width(), img.height()), (20, 10));
        assert_eq!(img.get_pixel(5, 5).0, [0x1E, 0x1E, 0x1E, 255]);
    }

    #[test]
    fn shading_fill_runs_corner_to_corner() {
        let mut canvas = Canvas::new(Size::new(40.0, 40.0));
        canvas.shading_fill(LinearShading::evenly_spaced(
            0.0,
            0.0,
            40.0,
            40.0,
            &[Color::BLACK, Color::WHITE],
        ));
        let img = decode(&scene_to_png(&canvas.finish(), 0, None).unwrap());
        let top_left = img.get_pixel(0, 0).0;
        let bottom_right = img.get_pixel(39, 39).0;
        assert!(top_left[0] < 20, "top-left {top_left:?}");
        assert!(bottom_right[0] > 235, "bottom-right {bottom_right:?}");
    }

    #[test]
    fn shadow_darkens_pixels_below_the_shape_only() {
        let mut canvas = Canvas::new(Size::new(60.0, 60.0));
        canvas.set_shadow(Shadow {
            color: Color::BLACK,
            opacity: 0.5,
            blur: Px::from_i32(4),
            offset_x: Px::ZERO,
            offset_y: Px::from_i32(4),
        });
        canvas.set_fill_color(Color::WHITE);
        canvas.rounded_rect(rect(10, 10, 40, 30), Px::from_i32(5));
        canvas.fill();
        let img = decode(&scene_to_png(&canvas.finish(), 0, None).unwrap());
        // Inside the shape the white fill covers the shadow.
        assert_eq!(img.get_pixel(30, 25).0, [255, 255, 255, 255]);
        // Just below the bottom edge the offset shadow shows.
        assert!(img.get_pixel(30, 42).0[0] < 250);
        // Far from the shape nothing is painted.
        assert_eq!(img.get_pixel(2, 2).0, [255, 255, 255, 255]);
    }

    #[test]
    fn opacity_blends_fill_over_background() {
        let mut canvas = Canvas::new(Size::new(10.0, 10.0));
        canvas.set_opacity(0.5);
        canvas.set_fill_color(Color::BLACK);
        canvas.draw_rect(rect(0, 0, 10, 10));
        let img = decode(&scene_to_png(&canvas.finish(), 0, None).unwrap());
        let value = img.get_pixel(5, 5).0[0];
        assert!((126..=129).contains(&value), "got {value}");
    }

    #[test]
    fn text_without_any_font_is_skipped_quietly() {
        let mut canvas = Canvas::new(Size::new(30.0, 30.0));
        canvas.set_font(&FontDescriptor::new("No Such Family", Px::from_i32(12)));
        canvas.draw_string(
            Px::from_i32(2),
            Px::from_i32(2),
            "Hi",
            TextAlign::Left,
            TextBaseline::Top,
        );
        let png = scene_to_png(&canvas.finish(), 0, None).unwrap();
        assert_eq!(decode(&png).dimensions(), (30, 30));
    }

    #[test]
    fn zero_sized_surface_is_a_render_failure() {
        let scene = Canvas::new(Size::new(0.0, 10.0)).finish();
        let err = match scene_to_png(&scene, 4, None) {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        match err {
            TextCardError::RenderFailure { page_index, .. } => assert_eq!(page_index, 4),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn glyph_path_builder_flips_y_axis() {
        let mut builder = GlyphPathBuilder::new(10.0, 100.0, 0.5);
        builder.move_to(0.0, 0.0);
        builder.line_to(20.0, 40.0);
        builder.line_to(0.0, 40.0);
        builder.close();
        let bounds = builder.finish().unwrap().bounds();
        assert_eq!(bounds.left(), 10.0);
        assert_eq!(bounds.top(), 80.0);
        assert_eq!(bounds.bottom(), 100.0);
    }

    #[test]
    fn drawn_text_stays_inside_its_measured_width() {
        let names: Vec<&str> = crate::system_font::LATIN_FACES
            .iter()
            .map(|(regular, _)| *regular)
            .collect();
        let Some((_, data)) = crate::system_font::find_named(&names) else {
            eprintln!("no Latin system font installed; skipping");
            return;
        };
        let mut registry = FontRegistry::new();
        let name = registry.register_bytes(data, None).unwrap();
        let font = FontDescriptor::new(name, Px::from_i32(20));
        let text = "WWWWWW";
        let width = registry.measure_text_width(&font, text).to_f32();

        let mut canvas = Canvas::new(Size::new(width + 40.0, 40.0));
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font(&font);
        canvas.draw_string(
            Px::from_i32(10),
            Px::from_i32(5),
            text,
            TextAlign::Left,
            TextBaseline::Top,
        );
        let img = decode(&scene_to_png(&canvas.finish(), 0, Some(&registry)).unwrap());
        let limit = (10.0 + width).ceil() as u32 + 1;
        let mut inked = 0;
        for (x, _, pixel) in img.enumerate_pixels() {
            if pixel.0[0] < 128 {
                inked += 1;
                assert!(x <= limit, "ink at x={x}, measured edge {limit}");
            }
        }
        assert!(inked > 0);
    }
}
