// Certificate PDF generation
// Uses genpdf - Liberation/DejaVu fonts from FONT_DIR, assets/fonts or standard paths
use genpdf::elements::Image;
use genpdf::fonts::{FontCache, FontData, FontFamily};
use genpdf::render::Area;
use genpdf::style::Style;
use genpdf::{Context, Element, Position, RenderResult, Scale, Size};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dates::display_date;
use crate::db::CertificateRecord;
use crate::error::RenderError;
use crate::layout::{wrap_centered, FontSpec, TextMeasure, WrapBox};

/// Landscape A4 in millimetres.
pub const PAGE_WIDTH: f64 = 297.0;
pub const PAGE_HEIGHT: f64 = 210.0;

const FONT_PATHS: &[&str] = &[
    "assets/fonts",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/System/Library/Fonts/Supplemental",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const FONT_NAMES: &[&str] = &["LiberationSans", "DejaVuSans", "Arial"];

const TITLE: FontSpec = FontSpec::bold(30);
const INTRO: FontSpec = FontSpec::regular(18);
const NAME: FontSpec = FontSpec::bold(26);
const BODY: FontSpec = FontSpec::regular(16);
const CLOSING: FontSpec = FontSpec::regular(14);
const FOOTER: FontSpec = FontSpec::regular(12);
const CAPTION: FontSpec = FontSpec::regular(11);

// Vertical bands as fractions of page height, horizontal as fractions of width.
const TITLE_Y: f64 = 0.20;
const INTRO_Y: f64 = 0.33;
const NAME_Y: f64 = 0.42;
const BODY_Y: f64 = 0.54;
const CLOSING_Y: f64 = 0.68;
const DATE_Y: f64 = 0.855;
const NUMBER_Y: f64 = 0.895;
const FOOTER_X: f64 = 0.10;
const SIDE_MARGIN: f64 = 0.15;
const SIGNATURE_Y: f64 = 0.86;
const SIGNATURE_FROM_X: f64 = 0.70;
const SIGNATURE_TO_X: f64 = 0.90;

pub trait CertificateRenderer {
    /// Writes the document for `record` to `path`, replacing any existing file.
    fn render(&self, record: &CertificateRecord, path: &Path) -> Result<(), RenderError>;
}

/// Loads a regular/bold/italic font family, trying `font_dir` first and then
/// the usual system locations.
pub fn load_fonts(
    font_dir: Option<&Path>,
    family: Option<&str>,
) -> Result<FontFamily<FontData>, RenderError> {
    let mut dirs: Vec<PathBuf> = font_dir.map(Path::to_path_buf).into_iter().collect();
    dirs.extend(
        FONT_PATHS
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists()),
    );

    let mut names: Vec<&str> = family.into_iter().collect();
    names.extend(FONT_NAMES.iter().copied());

    dirs.iter()
        .find_map(|dir| {
            names
                .iter()
                .find_map(|name| load_family(dir, name).ok())
        })
        .ok_or_else(|| {
            RenderError::Fonts(
                "No suitable fonts found. Install: apt install fonts-liberation, or set FONT_DIR"
                    .to_string(),
            )
        })
}

/// Accepts `Name-Regular.ttf`/`Name-Italic.ttf` files as well as the
/// `Name.ttf`/`Name-Oblique.ttf` naming DejaVu ships with.
fn load_family(dir: &Path, name: &str) -> Result<FontFamily<FontData>, genpdf::error::Error> {
    genpdf::fonts::from_files(dir, name, None).or_else(|_| {
        let load = |suffix: &str| FontData::load(dir.join(format!("{name}{suffix}.ttf")), None);
        Ok(FontFamily {
            regular: load("")?,
            bold: load("-Bold")?,
            italic: load("-Oblique")?,
            bold_italic: load("-BoldOblique")?,
        })
    })
}

pub struct PdfRenderer {
    fonts: FontFamily<FontData>,
    background: PathBuf,
}

impl PdfRenderer {
    pub fn new(fonts: FontFamily<FontData>, background: impl Into<PathBuf>) -> Self {
        Self {
            fonts,
            background: background.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, RenderError> {
        let fonts = load_fonts(config.font_dir.as_deref(), config.font_family.as_deref())?;
        Ok(Self::new(fonts, &config.background_template_path))
    }

    fn background(&self) -> Result<Option<Background>, RenderError> {
        if !self.background.is_file() {
            return Ok(None);
        }
        let (px_width, px_height) = image::image_dimensions(&self.background)
            .map_err(|e| RenderError::Background(e.to_string()))?;
        let image = Image::from_path(&self.background)
            .map_err(|e| RenderError::Background(e.to_string()))?;
        Ok(Some(Background {
            image,
            fit: full_bleed(px_width, px_height),
        }))
    }

    pub fn render_bytes(&self, record: &CertificateRecord) -> Result<Vec<u8>, RenderError> {
        let mut doc = genpdf::Document::new(self.fonts.clone());
        doc.set_title(format!("Certificate {}", record.number));
        doc.set_paper_size(Size::new(PAGE_WIDTH, PAGE_HEIGHT));
        doc.push(CertificatePage {
            content: PageContent::for_record(record),
            background: self.background()?,
        });

        let mut bytes = Vec::new();
        doc.render(&mut bytes)?;
        Ok(bytes)
    }
}

impl CertificateRenderer for PdfRenderer {
    fn render(&self, record: &CertificateRecord, path: &Path) -> Result<(), RenderError> {
        let bytes = self.render_bytes(record)?;
        write_replacing(path, &bytes)?;
        tracing::debug!("Rendered {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Writes through a temporary sibling and renames it over `path`, so readers
/// never see a half-written document.
pub fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".certificate")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BleedFit {
    pub dpi: f64,
    pub scale_y: f64,
}

/// DPI that stretches the image across the page width, plus the vertical
/// scale that makes it cover the height too.
pub fn full_bleed(px_width: u32, px_height: u32) -> BleedFit {
    // genpdf refuses images that exceed the area, so stay a hair inside it.
    let width = PAGE_WIDTH - 0.01;
    let height = PAGE_HEIGHT - 0.01;
    let dpi = px_width.max(1) as f64 * 25.4 / width;
    let natural_height = px_height.max(1) as f64 * 25.4 / dpi;
    BleedFit {
        dpi,
        scale_y: height / natural_height,
    }
}

struct Background {
    image: Image,
    fit: BleedFit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageContent {
    pub title: String,
    pub intro: String,
    pub name: String,
    pub body: String,
    pub closing: String,
    pub date_line: String,
    pub number_line: String,
    pub signature_caption: String,
}

impl PageContent {
    pub fn for_record(record: &CertificateRecord) -> Self {
        Self {
            title: "CERTIFICATE".to_string(),
            intro: "This certifies that".to_string(),
            name: record.name.clone(),
            body: format!(
                "has successfully participated in the event / course {}.",
                record.event
            ),
            closing: "This certificate is awarded in recognition of the commitment and \
                      dedication shown throughout the activity."
                .to_string(),
            date_line: format!("Issue date: {}", display_date(&record.issue_date)),
            number_line: format!("Certificate no.: {}", record.number),
            signature_caption: "Signature / Organization".to_string(),
        }
    }
}

/// 1.2 × the point size, in millimetres.
fn line_height(font: FontSpec) -> f64 {
    f64::from(font.size) * 1.2 * 25.4 / 72.0
}

fn style_for(font: FontSpec) -> Style {
    let style = Style::new().with_font_size(font.size);
    if font.bold {
        style.bold()
    } else {
        style
    }
}

struct GenpdfMeasure<'a> {
    font_cache: &'a FontCache,
}

impl TextMeasure for GenpdfMeasure<'_> {
    fn width(&self, text: &str, font: FontSpec) -> f64 {
        f64::from(style_for(font).str_width(self.font_cache, text))
    }
}

struct CertificatePage {
    content: PageContent,
    background: Option<Background>,
}

fn draw_centered(
    area: &Area<'_>,
    measure: &GenpdfMeasure<'_>,
    text: &str,
    font: FontSpec,
    center_x: f64,
    y: f64,
) -> Result<(), genpdf::error::Error> {
    let x = center_x - measure.width(text, font) / 2.0;
    area.print_str(
        measure.font_cache,
        Position::new(x, y),
        style_for(font),
        text,
    )?;
    Ok(())
}

fn draw_paragraph(
    area: &Area<'_>,
    measure: &GenpdfMeasure<'_>,
    text: &str,
    font: FontSpec,
    top: f64,
) -> Result<(), genpdf::error::Error> {
    let margin = PAGE_WIDTH * SIDE_MARGIN;
    let bounds = WrapBox {
        max_width: PAGE_WIDTH - 2.0 * margin,
        top,
        line_height: line_height(font),
        center_x: PAGE_WIDTH / 2.0,
    };
    for line in wrap_centered(text, measure, font, bounds) {
        area.print_str(
            measure.font_cache,
            Position::new(line.x, line.y),
            style_for(font),
            &line.text,
        )?;
    }
    Ok(())
}

impl Element for CertificatePage {
    fn render(
        &mut self,
        context: &Context,
        area: Area<'_>,
        style: Style,
    ) -> Result<RenderResult, genpdf::error::Error> {
        if let Some(background) = self.background.take() {
            let mut image = background
                .image
                .with_position(Position::new(0.0, 0.0))
                .with_dpi(background.fit.dpi)
                .with_scale(Scale::new(1.0, background.fit.scale_y));
            image.render(context, area.clone(), style)?;
        }

        let measure = GenpdfMeasure {
            font_cache: &context.font_cache,
        };
        let c = &self.content;
        let center = PAGE_WIDTH / 2.0;

        draw_centered(&area, &measure, &c.title, TITLE, center, PAGE_HEIGHT * TITLE_Y)?;
        draw_centered(&area, &measure, &c.intro, INTRO, center, PAGE_HEIGHT * INTRO_Y)?;
        draw_centered(&area, &measure, &c.name, NAME, center, PAGE_HEIGHT * NAME_Y)?;
        draw_paragraph(&area, &measure, &c.body, BODY, PAGE_HEIGHT * BODY_Y)?;
        draw_paragraph(&area, &measure, &c.closing, CLOSING, PAGE_HEIGHT * CLOSING_Y)?;

        let footer_x = PAGE_WIDTH * FOOTER_X;
        area.print_str(
            &context.font_cache,
            Position::new(footer_x, PAGE_HEIGHT * DATE_Y),
            style_for(FOOTER),
            &c.date_line,
        )?;
        area.print_str(
            &context.font_cache,
            Position::new(footer_x, PAGE_HEIGHT * NUMBER_Y),
            style_for(FOOTER),
            &c.number_line,
        )?;

        let line_y = PAGE_HEIGHT * SIGNATURE_Y;
        area.draw_line(
            vec![
                Position::new(PAGE_WIDTH * SIGNATURE_FROM_X, line_y),
                Position::new(PAGE_WIDTH * SIGNATURE_TO_X, line_y),
            ],
            Style::new(),
        );
        let caption_x = PAGE_WIDTH * (SIGNATURE_FROM_X + SIGNATURE_TO_X) / 2.0;
        draw_centered(
            &area,
            &measure,
            &c.signature_caption,
            CAPTION,
            caption_x,
            line_y + 2.0,
        )?;

        Ok(RenderResult {
            size: area.size(),
            has_more: false,
        })
    }
}
