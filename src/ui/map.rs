/// Campus map canvas
///
/// Projects building coordinates with web-mercator (slippy map) maths,
/// draws a marker per building and a popup for the clicked one. Clicking
/// the popup asks for the building's details by id.
use std::f64::consts::PI;

use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Frame, Path, Program, Stroke, Text};
use iced::{Color, Pixels, Point, Rectangle, Renderer, Size, Theme, Vector};

use crate::state::data::{BuildingId, CampusBuilding, Coordinate, MapStyle};
use crate::Message;

/// World size of one zoom-0 tile in pixels
const TILE_SIZE: f64 = 256.0;

pub const DEFAULT_CENTER: (f64, f64) = (43.4735, -80.5273);
pub const DEFAULT_ZOOM: f64 = 16.0;
/// Zoom used when focusing a single building
pub const FOCUS_ZOOM: f64 = 18.0;
const MIN_ZOOM: f64 = 13.0;
const MAX_ZOOM: f64 = 20.0;

const MARKER_RADIUS: f32 = 7.0;
const HIT_RADIUS: f32 = 12.0;
/// Cursor travel below which a press-release counts as a click
const CLICK_SLOP: f32 = 4.0;
const GRID_SPACING: f64 = 64.0;

/// #8b5cf6
const ACCENT: Color = Color::from_rgb(0.545, 0.361, 0.965);

/// Camera of the map widget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_CENTER.0,
            center_lon: DEFAULT_CENTER.1,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl MapView {
    /// Centre on a coordinate at building zoom
    pub fn focus(coordinate: Coordinate) -> Self {
        Self {
            center_lat: coordinate.lat(),
            center_lon: coordinate.lon(),
            zoom: FOCUS_ZOOM,
        }
    }

    pub fn zoomed(self, delta: f32) -> Self {
        Self {
            zoom: (self.zoom + delta as f64).clamp(MIN_ZOOM, MAX_ZOOM),
            ..self
        }
    }

    /// Move the map content by a screen-space delta
    pub fn panned(self, delta: Vector) -> Self {
        let (x, y) = project(self.center_lat, self.center_lon, self.zoom);
        let (center_lat, center_lon) =
            unproject(x - delta.x as f64, y - delta.y as f64, self.zoom);
        Self {
            center_lat,
            center_lon,
            ..self
        }
    }

    fn to_screen(&self, coordinate: Coordinate, size: Size) -> Point {
        let (cx, cy) = project(self.center_lat, self.center_lon, self.zoom);
        let (x, y) = project(coordinate.lat(), coordinate.lon(), self.zoom);
        Point::new(
            (x - cx) as f32 + size.width / 2.0,
            (y - cy) as f32 + size.height / 2.0,
        )
    }

    /// World-pixel position of the canvas' top-left corner
    fn origin(&self, size: Size) -> (f64, f64) {
        let (cx, cy) = project(self.center_lat, self.center_lon, self.zoom);
        (cx - size.width as f64 / 2.0, cy - size.height as f64 / 2.0)
    }
}

/// Latitude/longitude to world pixels at `zoom`
fn project(lat: f64, lon: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let x = (lon + 180.0) / 360.0 * scale;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

/// World pixels at `zoom` back to latitude/longitude
fn unproject(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2f64.powf(zoom);
    let lon = x / scale * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / scale);
    let lat = n.sinh().atan().to_degrees();
    (lat, lon)
}

/// Popup box anchored above a marker
fn popup_rect(anchor: Point, building: &CampusBuilding) -> Rectangle {
    let width = (building.name.chars().count() as f32 * 7.5 + 24.0).max(150.0);
    let height = 74.0;
    Rectangle::new(
        Point::new(anchor.x - width / 2.0, anchor.y - height - MARKER_RADIUS - 8.0),
        Size::new(width, height),
    )
}

struct Palette {
    background: Color,
    grid: Color,
    label: Color,
}

fn palette(style: MapStyle) -> Palette {
    match style {
        MapStyle::Standard => Palette {
            background: Color::from_rgb(0.93, 0.92, 0.89),
            grid: Color::from_rgba(0.0, 0.0, 0.0, 0.07),
            label: Color::from_rgb(0.15, 0.15, 0.18),
        },
        MapStyle::Satellite => Palette {
            background: Color::from_rgb(0.16, 0.22, 0.16),
            grid: Color::from_rgba(1.0, 1.0, 1.0, 0.06),
            label: Color::WHITE,
        },
        MapStyle::Hybrid => Palette {
            background: Color::from_rgb(0.20, 0.25, 0.21),
            grid: Color::from_rgba(1.0, 0.95, 0.7, 0.22),
            label: Color::WHITE,
        },
    }
}

/// The map widget for one frame
pub struct CampusMap<'a> {
    pub buildings: &'a [CampusBuilding],
    pub selected: Option<&'a BuildingId>,
    pub popup: Option<&'a BuildingId>,
    pub view: MapView,
    pub style: MapStyle,
}

impl<'a> CampusMap<'a> {
    fn popup_building(&self) -> Option<&'a CampusBuilding> {
        let id = self.popup?;
        self.buildings.iter().find(|b| &b.id == id)
    }

    /// Resolve a click: the open popup first, then the nearest marker.
    fn click(&self, position: Point, size: Size) -> Message {
        if let Some(building) = self.popup_building() {
            let anchor = self.view.to_screen(building.coordinate, size);
            if popup_rect(anchor, building).contains(position) {
                return Message::ShowBuilding(building.id.clone());
            }
        }

        let hit = self
            .buildings
            .iter()
            .map(|b| (b, self.view.to_screen(b.coordinate, size).distance(position)))
            .filter(|(_, distance)| *distance <= HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(b, _)| b.id.clone());

        Message::MarkerClicked(hit)
    }

    fn draw_grid(&self, frame: &mut Frame, palette: &Palette, size: Size) {
        let (ox, oy) = self.view.origin(size);
        let stroke = || Stroke::default().with_color(palette.grid).with_width(1.0);

        let mut x = (ox / GRID_SPACING).ceil() * GRID_SPACING - ox;
        while x < size.width as f64 {
            let line = Path::line(Point::new(x as f32, 0.0), Point::new(x as f32, size.height));
            frame.stroke(&line, stroke());
            x += GRID_SPACING;
        }

        let mut y = (oy / GRID_SPACING).ceil() * GRID_SPACING - oy;
        while y < size.height as f64 {
            let line = Path::line(Point::new(0.0, y as f32), Point::new(size.width, y as f32));
            frame.stroke(&line, stroke());
            y += GRID_SPACING;
        }
    }

    fn draw_popup(&self, frame: &mut Frame, building: &CampusBuilding, size: Size) {
        let anchor = self.view.to_screen(building.coordinate, size);
        let rect = popup_rect(anchor, building);

        let body = Path::rectangle(rect.position(), rect.size());
        frame.fill(&body, Color::WHITE);
        frame.stroke(&body, Stroke::default().with_color(ACCENT).with_width(1.5));

        let left = rect.x + 12.0;
        frame.fill_text(Text {
            content: building.name.clone(),
            position: Point::new(left, rect.y + 8.0),
            color: ACCENT,
            size: Pixels(14.0),
            ..Text::default()
        });
        frame.fill_text(Text {
            content: building.code.clone(),
            position: Point::new(left, rect.y + 28.0),
            color: Color::from_rgb(0.35, 0.35, 0.4),
            size: Pixels(12.0),
            ..Text::default()
        });
        frame.fill_text(Text {
            content: "View Details ›".to_string(),
            position: Point::new(left, rect.y + 48.0),
            color: ACCENT,
            size: Pixels(13.0),
            ..Text::default()
        });
    }
}

impl<'a> Program<Message> for CampusMap<'a> {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let size = bounds.size();
        let mut frame = Frame::new(renderer, size);
        let palette = palette(self.style);

        frame.fill_rectangle(Point::ORIGIN, size, palette.background);
        self.draw_grid(&mut frame, &palette, size);

        for building in self.buildings {
            let position = self.view.to_screen(building.coordinate, size);
            let is_selected = self.selected == Some(&building.id);
            let radius = if is_selected { MARKER_RADIUS + 3.0 } else { MARKER_RADIUS };

            let marker = Path::circle(position, radius);
            frame.fill(&marker, ACCENT);
            frame.stroke(
                &marker,
                Stroke::default()
                    .with_color(Color::WHITE)
                    .with_width(if is_selected { 3.0 } else { 1.5 }),
            );

            frame.fill_text(Text {
                content: building.code.clone(),
                position: Point::new(position.x + radius + 4.0, position.y - 7.0),
                color: palette.label,
                size: Pixels(12.0),
                ..Text::default()
            });
        }

        if let Some(building) = self.popup_building() {
            self.draw_popup(&mut frame, building, size);
        }

        frame.fill_text(Text {
            content: format!("{} · zoom {:.1}", self.style.label(), self.view.zoom),
            position: Point::new(10.0, size.height - 22.0),
            color: palette.label,
            size: Pixels(12.0),
            ..Text::default()
        });

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse wheel for zooming
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.position_in(bounds).is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let zoom_delta = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 0.5,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                };
                return (canvas::event::Status::Captured, Some(Message::MapZoomed(zoom_delta)));
            }

            // Press: may become a click or a drag
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(position) = cursor.position_in(bounds) {
                    state.pressed_at = Some(position);
                    state.last_position = Some(position);
                    state.dragged = false;
                    return (canvas::event::Status::Captured, None);
                }
            }

            // Release: a press that never moved far is a click
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.pressed_at.take().is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                state.last_position = None;

                let message = match cursor.position_in(bounds) {
                    Some(position) if !state.dragged => Some(self.click(position, bounds.size())),
                    _ => None,
                };
                state.dragged = false;
                return (canvas::event::Status::Captured, message);
            }

            // Move: pan while the button is held
            canvas::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if let (Some(pressed_at), Some(last), Some(current)) = (
                    state.pressed_at,
                    state.last_position,
                    cursor.position_in(bounds),
                ) {
                    if current.distance(pressed_at) > CLICK_SLOP {
                        state.dragged = true;
                    }
                    if state.dragged {
                        state.last_position = Some(current);
                        return (
                            canvas::event::Status::Captured,
                            Some(Message::MapPanned(current - last)),
                        );
                    }
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }
}

/// State for click and drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pressed_at: Option<Point>,
    last_position: Option<Point>,
    dragged: bool,
}
