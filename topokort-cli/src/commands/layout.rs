//! Layout command - print the page plan for a track without fetching tiles.

use topokort::geometry::track_length;
use topokort::layout::{compute_layout, Layout};
use topokort::track::ProjectedTrack;
use topokort::RenderError;

use super::common::LayoutArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the layout command.
pub fn run(args: LayoutArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("layout");

    let config = args.apply(runner.config().render.clone());
    let track = args.read_track()?;
    let projected = ProjectedTrack::new(&track).map_err(RenderError::from)?;
    let layout = compute_layout(&projected.points, &config.layout).map_err(RenderError::from)?;

    println!("Track:  {} points, {} segment(s)", track.len(), track.segment_count());
    println!("Length: {:.1} km", track_length(&projected.points) / 1000.0);
    println!("Zone:   UTM {} ({})", projected.projection.epsg().zone(), projected.projection.epsg());
    println!();
    print_pages(&layout);
    Ok(())
}

fn print_pages(layout: &Layout) {
    println!("{}", layout.status);
    if let Some((cols, rows)) = layout.grid {
        println!("Grid: {cols} x {rows}");
    }
    println!();
    println!("{:>4}  {:<10}  {:>12}  {:>12}  {:>9}", "Page", "Layout", "Centre E", "Centre N", "Size mm");
    for (i, page) in layout.pages.pages().iter().enumerate() {
        let center = page.bbox.center();
        println!(
            "{:>4}  {:<10}  {:>12.0}  {:>12.0}  {:>4.0}x{:<4.0}",
            i + 1,
            page.orientation(),
            center.x,
            center.y,
            page.metrics.width_mm,
            page.metrics.height_mm
        );
    }
}
