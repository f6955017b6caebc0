//! Vector drawing backend emitting PDF operators on a page layer.
//!
//! One backend pixel is one PDF point. Backend coordinates grow downwards
//! from the top-left corner while PDF user space grows upwards from the
//! bottom-left corner, so every y coordinate is flipped against the page
//! height.

use std::{convert::Infallible, f64::consts::TAU};

use plotters_backend::{
    BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend, DrawingErrorKind,
    FontTransform,
    text_anchor::{HPos, Pos, VPos},
};
use printpdf::{
    Color, IndirectFontRef, Line, Mm, PdfLayerReference, Point, Polygon, Pt, Rgb, TextMatrix,
    path::{PaintMode, WindingOrder},
};
use resource_report_core::PageSize;

/// Average Helvetica advance width as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.5;
/// Segments used to approximate a circle.
const CIRCLE_SEGMENTS: u32 = 24;

type DrawResult = Result<(), DrawingErrorKind<Infallible>>;

/// Plotters backend drawing onto one PDF page layer.
pub(crate) struct PdfPageBackend {
    layer: PdfLayerReference,
    font: IndirectFontRef,
    size: PageSize,
}

impl PdfPageBackend {
    pub(crate) const fn new(layer: PdfLayerReference, font: IndirectFontRef, size: PageSize) -> Self {
        Self { layer, font, size }
    }

    #[expect(clippy::cast_possible_truncation, reason = "page coordinates fit in f32")]
    fn point(&self, (x, y): (f64, f64)) -> Point {
        let flipped = f64::from(self.size.height()) - y;
        Point::new(Mm::from(Pt(x as f32)), Mm::from(Pt(flipped as f32)))
    }

    fn points(&self, coords: impl IntoIterator<Item = BackendCoord>) -> Vec<(Point, bool)> {
        coords
            .into_iter()
            .map(|(x, y)| (self.point((f64::from(x), f64::from(y))), false))
            .collect()
    }

    /// Applies the stroke colour and width, returning `false` for invisible
    /// styles.
    #[expect(clippy::cast_precision_loss, reason = "stroke widths are tiny")]
    fn stroke(&self, style: &impl BackendStyle) -> bool {
        let color = style.color();
        if !is_visible(color) {
            return false;
        }
        self.layer.set_outline_color(pdf_color(color));
        self.layer.set_outline_thickness(style.stroke_width() as f32);
        true
    }

    fn fill(&self, color: BackendColor) -> bool {
        if !is_visible(color) {
            return false;
        }
        self.layer.set_fill_color(pdf_color(color));
        true
    }

    fn stroke_path(&self, coords: Vec<BackendCoord>, closed: bool, style: &impl BackendStyle) {
        if coords.len() < 2 || !self.stroke(style) {
            return;
        }
        self.layer.add_line(Line {
            points: self.points(coords),
            is_closed: closed,
        });
    }

    fn fill_path(&self, coords: Vec<BackendCoord>, color: BackendColor) {
        if coords.len() < 3 || !self.fill(color) {
            return;
        }
        self.layer.add_polygon(Polygon {
            rings: vec![self.points(coords)],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }
}

impl DrawingBackend for PdfPageBackend {
    type ErrorType = Infallible;

    fn get_size(&self) -> (u32, u32) {
        (self.size.width(), self.size.height())
    }

    fn ensure_prepared(&mut self) -> DrawResult {
        Ok(())
    }

    fn present(&mut self) -> DrawResult {
        Ok(())
    }

    fn draw_pixel(&mut self, (x, y): BackendCoord, color: BackendColor) -> DrawResult {
        self.fill_path(vec![(x, y), (x + 1, y), (x + 1, y + 1), (x, y + 1)], color);
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> DrawResult {
        self.stroke_path(vec![from, to], false, style);
        Ok(())
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        (left, top): BackendCoord,
        (right, bottom): BackendCoord,
        style: &S,
        fill: bool,
    ) -> DrawResult {
        let corners = vec![(left, top), (right, top), (right, bottom), (left, bottom)];
        if fill {
            self.fill_path(corners, style.color());
        } else {
            self.stroke_path(corners, true, style);
        }
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> DrawResult {
        self.stroke_path(path.into_iter().collect(), false, style);
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> DrawResult {
        let outline = circle_outline(center, radius);
        if fill {
            self.fill_path(outline, style.color());
        } else {
            self.stroke_path(outline, true, style);
        }
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> DrawResult {
        self.fill_path(vert.into_iter().collect(), style.color());
        Ok(())
    }

    #[expect(clippy::cast_possible_truncation, reason = "font sizes fit in f32")]
    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> DrawResult {
        if text.is_empty() || !self.fill(style.color()) {
            return Ok(());
        }
        let size = style.size();
        let transform = style.transform();
        let origin = text_origin(pos, style.anchor(), &transform, text_width(text, size), size);
        let Point { x, y } = self.point(origin);

        self.layer.begin_text_section();
        self.layer.set_font(&self.font, size as f32);
        self.layer
            .set_text_matrix(TextMatrix::TranslateRotate(x, y, rotation_degrees(&transform)));
        self.layer.write_text(text, &self.font);
        self.layer.end_text_section();
        Ok(())
    }

    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "estimates are small and non-negative"
    )]
    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        let size = style.size();
        Ok((
            text_width(text, size).ceil() as u32,
            size.ceil() as u32,
        ))
    }
}

fn is_visible(color: BackendColor) -> bool {
    color.alpha > f64::EPSILON
}

fn pdf_color(color: BackendColor) -> Color {
    let (red, green, blue) = color.rgb;
    Color::Rgb(Rgb::new(
        f32::from(red) / 255.0,
        f32::from(green) / 255.0,
        f32::from(blue) / 255.0,
        None,
    ))
}

#[expect(clippy::cast_precision_loss, reason = "label lengths are short")]
fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * GLYPH_WIDTH_RATIO
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "circle points stay on the page"
)]
fn circle_outline((cx, cy): BackendCoord, radius: u32) -> Vec<BackendCoord> {
    let radius = f64::from(radius);
    (0..CIRCLE_SEGMENTS)
        .map(|step| {
            let angle = TAU * f64::from(step) / f64::from(CIRCLE_SEGMENTS);
            (
                cx + (radius * angle.cos()).round() as i32,
                cy + (radius * angle.sin()).round() as i32,
            )
        })
        .collect()
}

/// Counter-clockwise rotation of the text baseline in PDF user space.
///
/// Plotters rotates clockwise on a y-down canvas, which is the opposite
/// sense once the page is flipped.
const fn rotation_degrees(transform: &FontTransform) -> f32 {
    match transform {
        FontTransform::None => 0.0,
        FontTransform::Rotate90 => -90.0,
        FontTransform::Rotate180 => 180.0,
        FontTransform::Rotate270 => 90.0,
    }
}

/// Baseline start of a text run anchored at `pos`, in backend coordinates.
///
/// `along` is the reading direction and `down` points from ascender to
/// descender, both on the y-down canvas.
fn text_origin(
    (x, y): BackendCoord,
    anchor: Pos,
    transform: &FontTransform,
    width: f64,
    size: f64,
) -> (f64, f64) {
    let (along, down) = match transform {
        FontTransform::None => ((1.0, 0.0), (0.0, 1.0)),
        FontTransform::Rotate90 => ((0.0, 1.0), (-1.0, 0.0)),
        FontTransform::Rotate180 => ((-1.0, 0.0), (0.0, -1.0)),
        FontTransform::Rotate270 => ((0.0, -1.0), (1.0, 0.0)),
    };
    let back = match anchor.h_pos {
        HPos::Left => 0.0,
        HPos::Center => width / 2.0,
        HPos::Right => width,
    };
    let drop = match anchor.v_pos {
        VPos::Top => size * 0.75,
        VPos::Center => size * 0.35,
        VPos::Bottom => -size * 0.2,
    };
    (
        f64::from(x) - back * along.0 + drop * down.0,
        f64::from(y) - back * along.1 + drop * down.1,
    )
}
