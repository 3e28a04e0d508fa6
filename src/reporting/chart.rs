use std::fmt::Display;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::aggregate::{AggregateGroup, GroupKey};
use super::{format_yen, ReportError};

const SIZE: (u32, u32) = (1400, 1000);
const FONT: &str = "sans-serif";

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const LIGHT_CORAL: RGBColor = RGBColor(240, 128, 128);
const LINE_GREEN: RGBColor = RGBColor(0, 128, 0);
const PIE_COLORS: [RGBColor; 5] = [
    RGBColor(255, 215, 0),
    RGBColor(173, 216, 230),
    RGBColor(144, 238, 144),
    RGBColor(255, 192, 203),
    RGBColor(255, 165, 0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub revenue: Decimal,
    pub height: f64,
}

impl Bar {
    fn from_group<K: GroupKey>(group: &AggregateGroup<K>) -> Result<Bar, ReportError> {
        Ok(Bar {
            label: group.key.label(),
            revenue: group.revenue,
            height: group.revenue.to_f64().ok_or(ReportError::Number(group.revenue))?,
        })
    }
}

/// Plot-ready values of the four dashboard panels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// `None` when no input carried a branch column.
    pub branches: Option<Vec<Bar>>,
    pub products: Vec<Bar>,
    pub daily: Vec<(NaiveDate, f64)>,
}

impl Dashboard {
    pub fn new(
        branches: Option<&[AggregateGroup<Option<String>>]>,
        products: &[AggregateGroup<String>],
        daily: &[AggregateGroup<NaiveDate>],
    ) -> Result<Dashboard, ReportError> {
        let branches = branches
            .map(|groups| groups.iter().map(Bar::from_group).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        let products = products.iter().map(Bar::from_group).collect::<Result<Vec<_>, _>>()?;
        let daily = daily
            .iter()
            .map(|group| Ok((group.key, Bar::from_group(group)?.height)))
            .collect::<Result<Vec<_>, ReportError>>()?;

        Ok(Dashboard {
            branches,
            products,
            daily,
        })
    }

    /// Share of each product in total revenue, in percent.
    pub fn product_shares(&self) -> Vec<f64> {
        let total: f64 = self.products.iter().map(|bar| bar.height).sum();
        if total <= 0.0 {
            return vec![0.0; self.products.len()];
        }

        self.products.iter().map(|bar| bar.height / total * 100.0).collect()
    }
}

fn chart_err<E: Display>(err: E) -> ReportError {
    ReportError::Chart(err.to_string())
}

/// Upper bound of a value axis with some headroom for the value labels.
fn axis_max(bars: &[Bar]) -> f64 {
    let max = bars.iter().map(|bar| bar.height).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.15
    } else {
        1.0
    }
}

fn center_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(index) => labels.get(*index).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

fn draw_placeholder<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, title: &str, message: &str) -> Result<(), ReportError> {
    let area = area.titled(title, (FONT, 22).into_font()).map_err(chart_err)?;
    let (width, height) = area.dim_in_pixel();
    area.draw(&Text::new(
        message.to_string(),
        (width as i32 / 2 - 60, height as i32 / 2),
        (FONT, 18).into_font(),
    ))
    .map_err(chart_err)?;

    Ok(())
}

fn draw_branch_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, bars: &[Bar]) -> Result<(), ReportError> {
    const TITLE: &str = "Branch Sales Ranking";
    if bars.is_empty() {
        return draw_placeholder(area, TITLE, "No branch data");
    }

    let labels: Vec<String> = bars.iter().map(|bar| bar.label.clone()).collect();
    let mut chart = ChartBuilder::on(area)
        .caption(TITLE, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d((0..bars.len()).into_segmented(), 0.0..axis_max(bars))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Branch")
        .y_desc("Sales (JPY)")
        .x_label_formatter(&|value: &SegmentValue<usize>| center_label(&labels, value))
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            let mut rect = Rectangle::new(
                [(SegmentValue::Exact(index), 0.0), (SegmentValue::Exact(index + 1), bar.height)],
                SKY_BLUE.filled(),
            );
            rect.set_margin(0, 0, 12, 12);
            rect
        }))
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            Text::new(format_yen(bar.revenue), (SegmentValue::CenterOf(index), bar.height), (FONT, 14).into_font())
        }))
        .map_err(chart_err)?;

    Ok(())
}

fn draw_product_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, bars: &[Bar]) -> Result<(), ReportError> {
    const TITLE: &str = "Product Sales Ranking";
    if bars.is_empty() {
        return draw_placeholder(area, TITLE, "No product data");
    }

    let labels: Vec<String> = bars.iter().map(|bar| bar.label.clone()).collect();
    let mut chart = ChartBuilder::on(area)
        .caption(TITLE, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(110)
        .build_cartesian_2d(0.0..axis_max(bars), (0..bars.len()).into_segmented())
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Sales (JPY)")
        .y_desc("Product")
        .y_label_formatter(&|value: &SegmentValue<usize>| center_label(&labels, value))
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            let mut rect = Rectangle::new(
                [(0.0, SegmentValue::Exact(index)), (bar.height, SegmentValue::Exact(index + 1))],
                LIGHT_CORAL.filled(),
            );
            rect.set_margin(6, 6, 0, 0);
            rect
        }))
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(index, bar)| {
            Text::new(format_yen(bar.revenue), (bar.height, SegmentValue::CenterOf(index)), (FONT, 14).into_font())
        }))
        .map_err(chart_err)?;

    Ok(())
}

fn draw_daily_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    points: &[(NaiveDate, f64)],
) -> Result<(), ReportError> {
    const TITLE: &str = "Daily Sales Trend";
    if points.is_empty() {
        return draw_placeholder(area, TITLE, "No daily data");
    }

    let labels: Vec<String> = points.iter().map(|(date, _)| date.format("%m-%d").to_string()).collect();
    let max = points.iter().map(|(_, value)| *value).fold(0.0, f64::max);
    let max = if max > 0.0 { max * 1.15 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(TITLE, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d((0..points.len()).into_segmented(), 0.0..max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Sales (JPY)")
        .x_label_formatter(&|value: &SegmentValue<usize>| center_label(&labels, value))
        .draw()
        .map_err(chart_err)?;

    let series: Vec<(SegmentValue<usize>, f64)> = points
        .iter()
        .enumerate()
        .map(|(index, (_, value))| (SegmentValue::CenterOf(index), *value))
        .collect();

    chart
        .draw_series(LineSeries::new(series.clone(), LINE_GREEN.stroke_width(2)))
        .map_err(chart_err)?;
    chart
        .draw_series(series.into_iter().map(|point| Circle::new(point, 5, LINE_GREEN.filled())))
        .map_err(chart_err)?;

    Ok(())
}

fn draw_share_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, dashboard: &Dashboard) -> Result<(), ReportError> {
    const TITLE: &str = "Product Sales Share";
    let shares = dashboard.product_shares();
    if shares.iter().all(|share| *share <= 0.0) {
        return draw_placeholder(area, TITLE, "No product data");
    }

    let area = area.titled(TITLE, (FONT, 22).into_font()).map_err(chart_err)?;
    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) * 0.35;

    let sizes: Vec<f64> = dashboard.products.iter().map(|bar| bar.height).collect();
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|index| PIE_COLORS[index % PIE_COLORS.len()]).collect();
    let labels: Vec<String> = dashboard.products.iter().map(|bar| bar.label.clone()).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(90.0);
    pie.label_style((FONT, 16).into_font());
    pie.percentages((FONT, 14).into_font());
    area.draw(&pie).map_err(chart_err)?;

    Ok(())
}

/// Whether plotters can resolve the font every label is drawn with.
pub fn font_available() -> bool {
    (FONT, 12).into_font().box_size("¥0").is_ok()
}

/// Renders the 2×2 dashboard into a PNG file.
///
/// Fails before touching `path` when no font is installed.
pub fn render_dashboard(path: &Path, dashboard: &Dashboard) -> Result<(), ReportError> {
    if !font_available() {
        return Err(ReportError::Chart(format!("no `{}` font is installed", FONT)));
    }
    debug!("rendering dashboard to {}", path.display());

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    let root = root
        .titled("Sales Analysis Dashboard", (FONT, 32).into_font().style(FontStyle::Bold))
        .map_err(chart_err)?;

    let panels = root.split_evenly((2, 2));
    match &dashboard.branches {
        Some(bars) => draw_branch_panel(&panels[0], bars)?,
        None => draw_placeholder(&panels[0], "Branch Sales Ranking", "No branch column")?,
    }
    draw_product_panel(&panels[1], &dashboard.products)?;
    draw_daily_panel(&panels[2], &dashboard.daily)?;
    draw_share_panel(&panels[3], dashboard)?;

    root.present().map_err(chart_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use super::*;

    fn group<K>(key: K, revenue: Decimal) -> AggregateGroup<K> {
        AggregateGroup {
            key,
            quantity: 1,
            revenue,
            first_seen: 0,
        }
    }

    #[test]
    fn test_dashboard_values() -> Result<()> {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let branches = vec![group(Some("東京".to_string()), dec!(300)), group(None, dec!(100))];
        let products = vec![group("A".to_string(), dec!(150.5)), group("B".to_string(), dec!(249.5))];
        let daily = vec![group(day, dec!(400))];

        let dashboard = Dashboard::new(Some(branches.as_slice()), &products, &daily)?;

        let branches = dashboard.branches.clone().unwrap();
        assert_eq!(branches[0].label, "東京");
        assert_eq!(branches[1].label, "(blank)");
        assert_eq!(branches[0].height, 300.0);
        assert_eq!(dashboard.products[0].revenue, dec!(150.5));
        assert_eq!(dashboard.daily, vec![(day, 400.0)]);

        let shares = dashboard.product_shares();
        assert!((shares[0] - 37.625).abs() < 1e-9);
        assert!((shares[1] - 62.375).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_dashboard_without_branches() -> Result<()> {
        let dashboard = Dashboard::new(None, &[], &[])?;

        assert_eq!(dashboard.branches, None);
        assert!(dashboard.product_shares().is_empty());

        Ok(())
    }

    #[test]
    fn test_render_dashboard_writes_png() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("chart.png");
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dashboard = Dashboard::new(None, &[group("A".to_string(), dec!(120))], &[group(day, dec!(120))])?;

        if !font_available() {
            assert!(matches!(render_dashboard(&path, &dashboard), Err(ReportError::Chart(_))));
            assert!(!path.exists());
            eprintln!("no sans-serif font installed, skipping the PNG check");
            return Ok(());
        }

        render_dashboard(&path, &dashboard)?;
        assert!(fs::metadata(&path)?.len() > 0);

        Ok(())
    }

    #[test]
    fn test_axis_max_has_headroom() {
        let bar = |height: f64| Bar {
            label: String::new(),
            revenue: Decimal::ZERO,
            height,
        };

        assert_eq!(axis_max(&[]), 1.0);
        assert_eq!(axis_max(&[bar(0.0)]), 1.0);
        assert!((axis_max(&[bar(100.0), bar(200.0)]) - 230.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_label() {
        let labels = vec!["東京".to_string(), "大阪".to_string()];

        assert_eq!(center_label(&labels, &SegmentValue::CenterOf(1)), "大阪");
        assert_eq!(center_label(&labels, &SegmentValue::CenterOf(5)), "");
        assert_eq!(center_label(&labels, &SegmentValue::Exact(0)), "");
    }
}
