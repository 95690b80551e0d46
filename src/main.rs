use std::sync::{Arc, Mutex};
use std::time::Duration;

use iced::futures::channel::mpsc;
use iced::futures::{SinkExt, StreamExt};
use iced::widget::{
    button, canvas, center, column, container, horizontal_space, mouse_area, opaque, row,
    scrollable, stack, text, text_input, Column, Row,
};
use iced::{stream, window, Alignment, Color, Element, Length, Subscription, Task, Theme, Vector};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod error;
mod state;
mod store;
mod ui;

use config::{Config, StoreKind};
use error::StateError;
use state::data::{BuildingId, CrowdStatus, MapStyle, StudySpace};
use state::profile::ProfileCache;
use state::CampusState;
use store::{MemoryStore, RemoteStore, SqliteStore};
use ui::map::{CampusMap, MapView};
use ui::status::{status_color, StatusDot};

/// Shown when a status the user reported could not be written
const UPDATE_FAILED_NOTICE: &str = "Failed to update status. Please try again.";

/// How long the refresh button shows its busy label
const REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Re-render interval that keeps "last updated" labels current
const CLOCK_TICK: Duration = Duration::from_secs(30);

/// Which top-level screen is visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Welcome,
    Main,
}

/// Tabs of the main screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Map,
    StudySpaces,
}

/// Open detail dialog
#[derive(Debug, Clone, PartialEq)]
enum Modal {
    Building(BuildingId),
    /// Shows the space selected in the application state
    StudySpace,
}

/// Main application
struct CampusCompanion {
    state: CampusState,
    screen: Screen,
    tab: Tab,
    modal: Option<Modal>,
    map_view: MapView,
    /// Building whose popup is open on the map
    popup: Option<BuildingId>,
    /// Status write in flight, if any
    pending_status: Option<CrowdStatus>,
    refreshing: bool,
    /// User-visible notice (failed update, directions)
    notice: Option<String>,
    /// Sending end handed to every `initialize` attempt
    sender: mpsc::UnboundedSender<Vec<StudySpace>>,
    /// Receiving end of the study-space subscription, taken once by `subscription`
    feed: Arc<Mutex<Option<mpsc::UnboundedReceiver<Vec<StudySpace>>>>>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Leave the welcome screen
    GetStarted,
    TabSelected(Tab),
    SearchChanged(String),
    ClearSearch,
    /// Building picked from the list: centre on it and open its details
    SelectBuilding(BuildingId),
    /// Click on the map; `None` when no marker was hit
    MarkerClicked(Option<BuildingId>),
    /// "View Details" in a map popup
    ShowBuilding(BuildingId),
    ShowDirections,
    MapStyleSelected(MapStyle),
    MapZoomed(f32),
    MapPanned(Vector),
    ShowStudySpace(String),
    /// Status button in the study-space dialog; carries the space it was rendered for
    ReportStatus {
        space_id: String,
        status: CrowdStatus,
    },
    StatusReported(Result<(), StateError>),
    /// Delivery from the study-space subscription
    SpacesChanged(Vec<StudySpace>),
    /// Refresh button; reopens the subscription if it is not open
    Refresh,
    RefreshFinished,
    /// Periodic re-render for relative timestamps
    Tick,
    CloseModal,
    DismissNotice,
    CloseRequested(window::Id),
}

impl CampusCompanion {
    /// Create the application, connect to the store and open the subscription
    fn new() -> (Self, Task<Message>) {
        let config = Config::load();
        let store = open_store(&config);
        let mut state = CampusState::new(store, ProfileCache::new(config.profile_dir.clone()));

        let (sender, receiver) = mpsc::unbounded();
        if let Err(e) = state.initialize(forward(sender.clone())) {
            error!("❌ Failed to initialize campus state: {e}");
        }

        info!(
            "🎓 Campus Companion started with {} buildings ({})",
            state.buildings().len(),
            if state.is_connected() { "connected" } else { "offline" }
        );

        (
            CampusCompanion {
                state,
                screen: Screen::Welcome,
                tab: Tab::Map,
                modal: None,
                map_view: MapView::default(),
                popup: None,
                pending_status: None,
                refreshing: false,
                notice: None,
                sender,
                feed: Arc::new(Mutex::new(Some(receiver))),
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::GetStarted => {
                self.screen = Screen::Main;
            }
            Message::TabSelected(tab) => {
                self.tab = tab;
            }
            Message::SearchChanged(search) => {
                self.state.set_search_text(search);
            }
            Message::ClearSearch => {
                self.state.set_search_text(String::new());
            }
            Message::SelectBuilding(id) => {
                let coordinate = self.state.select_building(&id).map(|b| b.coordinate);
                if let Some(coordinate) = coordinate {
                    self.map_view = MapView::focus(coordinate);
                    self.popup = Some(id.clone());
                    self.modal = Some(Modal::Building(id));
                }
            }
            Message::MarkerClicked(id) => {
                self.popup = id;
            }
            Message::ShowBuilding(id) => {
                if self.state.select_building(&id).is_some() {
                    self.modal = Some(Modal::Building(id));
                }
            }
            Message::ShowDirections => {
                self.notice = self.state.directions_to_selected();
                self.modal = None;
            }
            Message::MapStyleSelected(style) => {
                self.state.set_map_style(style);
            }
            Message::MapZoomed(delta) => {
                self.map_view = self.map_view.zoomed(delta);
            }
            Message::MapPanned(delta) => {
                self.map_view = self.map_view.panned(delta);
            }
            Message::ShowStudySpace(id) => {
                if self.state.select_space(&id).is_some() {
                    self.modal = Some(Modal::StudySpace);
                }
            }
            Message::ReportStatus { space_id, status } => {
                if self.pending_status.is_some() {
                    return Task::none();
                }
                self.pending_status = Some(status);
                return Task::perform(
                    self.state.set_crowd_status(&space_id, status),
                    Message::StatusReported,
                );
            }
            Message::StatusReported(result) => {
                self.pending_status = None;
                if let Err(e) = result {
                    warn!("⚠️  Status update rejected: {e}");
                    self.notice = Some(UPDATE_FAILED_NOTICE.to_string());
                }
            }
            Message::SpacesChanged(spaces) => {
                let selection_dropped = self.state.on_remote_change(spaces);
                if selection_dropped && self.modal == Some(Modal::StudySpace) {
                    self.modal = None;
                }
            }
            Message::Refresh => {
                self.refreshing = true;
                match self.state.initialize(forward(self.sender.clone())) {
                    Ok(()) => info!("🔌 Study space subscription reopened"),
                    Err(StateError::AlreadyInitialized) => {}
                    Err(e) => warn!("⚠️  Still unable to reach the study space store: {e}"),
                }
                return Task::perform(tokio::time::sleep(REFRESH_DELAY), |_| {
                    Message::RefreshFinished
                });
            }
            Message::RefreshFinished => {
                self.refreshing = false;
            }
            Message::Tick => {}
            Message::CloseModal => {
                if self.modal.take() == Some(Modal::StudySpace) {
                    self.state.clear_space_selection();
                }
            }
            Message::DismissNotice => {
                self.notice = None;
            }
            Message::CloseRequested(id) => {
                self.state.teardown();
                return window::close(id);
            }
        }

        Task::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let feed = Arc::clone(&self.feed);
        let spaces = Subscription::run_with_id(
            "study-spaces",
            stream::channel(100, move |mut output| async move {
                let receiver = feed.lock().ok().and_then(|mut slot| slot.take());
                let Some(mut receiver) = receiver else {
                    return;
                };
                while let Some(spaces) = receiver.next().await {
                    if output.send(Message::SpacesChanged(spaces)).await.is_err() {
                        break;
                    }
                }
            }),
        );

        Subscription::batch([
            spaces,
            iced::time::every(CLOCK_TICK).map(|_| Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let base = match self.screen {
            Screen::Welcome => self.view_welcome(),
            Screen::Main => self.view_main(),
        };

        let dialog = match &self.modal {
            Some(Modal::Building(id)) => self.view_building_modal(id),
            Some(Modal::StudySpace) => self.view_study_modal(),
            None => None,
        };

        match dialog {
            Some(dialog) => modal(base, dialog, Message::CloseModal),
            None => base,
        }
    }

    fn view_welcome(&self) -> Element<Message> {
        let content = column![
            text("Campus Companion").size(48),
            text("Find your way around campus and see how busy study spaces are right now.")
                .size(16),
            button(text("Get Started").size(18))
                .on_press(Message::GetStarted)
                .padding([10, 24]),
        ]
        .spacing(20)
        .padding(40)
        .align_x(Alignment::Center);

        center(content).into()
    }

    fn view_main(&self) -> Element<Message> {
        let body = match self.tab {
            Tab::Map => self.view_map_tab(),
            Tab::StudySpaces => self.view_study_tab(),
        };

        let mut content = Column::new().push(self.view_header()).push(self.view_tabs());
        if let Some(notice) = &self.notice {
            content = content.push(
                container(
                    row![
                        text(notice.as_str()),
                        horizontal_space(),
                        button("Dismiss")
                            .on_press(Message::DismissNotice)
                            .style(button::secondary),
                    ]
                    .spacing(10)
                    .align_y(Alignment::Center),
                )
                .padding(10)
                .width(Length::Fill)
                .style(container::rounded_box),
            );
        }

        content
            .push(body)
            .spacing(10)
            .padding(10)
            .height(Length::Fill)
            .into()
    }

    fn view_header(&self) -> Element<Message> {
        let (label, color) = if self.state.is_connected() {
            ("● Connected", Color::from_rgb8(0x22, 0xc5, 0x5e))
        } else {
            ("● Disconnected", Color::from_rgb8(0xef, 0x44, 0x44))
        };

        let user = match self.state.profile() {
            Some(profile) if self.state.is_logged_in() => profile.full_name.as_str(),
            _ => "Guest",
        };

        row![
            text("Campus Companion").size(24),
            horizontal_space(),
            text(label).color(color),
            text(user),
        ]
        .spacing(16)
        .align_y(Alignment::Center)
        .into()
    }

    fn view_tabs(&self) -> Element<Message> {
        let tab_button = |label: &'static str, tab: Tab| {
            let active = self.tab == tab;
            button(text(label))
                .on_press(Message::TabSelected(tab))
                .padding([6, 16])
                .style(move |theme: &Theme, status| {
                    if active {
                        button::primary(theme, status)
                    } else {
                        button::secondary(theme, status)
                    }
                })
        };

        row![
            tab_button("Map", Tab::Map),
            tab_button("Study Spaces", Tab::StudySpaces),
        ]
            .spacing(8)
            .into()
    }

    fn view_map_tab(&self) -> Element<Message> {
        let map = canvas(CampusMap {
            buildings: self.state.buildings(),
            selected: self.state.selected_building().map(|b| &b.id),
            popup: self.popup.as_ref(),
            view: self.map_view,
            style: self.state.map_style(),
        })
        .width(Length::Fill)
        .height(Length::Fill);

        row![self.view_sidebar(), map].spacing(10).into()
    }

    fn view_sidebar(&self) -> Element<Message> {
        let mut search = Row::new()
            .push(
                text_input("Search buildings...", self.state.search_text())
                    .on_input(Message::SearchChanged)
                    .padding(8),
            )
            .spacing(6);
        if !self.state.search_text().is_empty() {
            search = search.push(
                button("✕")
                    .on_press(Message::ClearSearch)
                    .style(button::secondary),
            );
        }

        let selected = self.state.selected_building().map(|b| &b.id);
        let buildings = Column::with_children(self.state.filtered_buildings().into_iter().map(
            |building| {
                let is_selected = selected == Some(&building.id);
                button(column![
                    text(building.name.as_str()),
                    text(building.code.as_str()).size(12),
                ])
                .width(Length::Fill)
                .on_press(Message::SelectBuilding(building.id.clone()))
                .style(move |theme: &Theme, status| {
                    if is_selected {
                        button::primary(theme, status)
                    } else {
                        button::text(theme, status)
                    }
                })
                .into()
            },
        ))
        .spacing(4);

        let current_style = self.state.map_style();
        let styles = Row::with_children(MapStyle::ALL.into_iter().map(|style| {
            button(text(style.label()).size(12))
                .on_press(Message::MapStyleSelected(style))
                .style(move |theme: &Theme, status| {
                    if style == current_style {
                        button::primary(theme, status)
                    } else {
                        button::secondary(theme, status)
                    }
                })
                .into()
        }))
        .spacing(4);

        column![
            search,
            scrollable(buildings).height(Length::Fill),
            styles,
        ]
        .spacing(10)
        .width(Length::Fixed(280.0))
        .into()
    }

    fn view_study_tab(&self) -> Element<Message> {
        let refresh = button(if self.refreshing { "Refreshing..." } else { "Refresh" })
            .on_press_maybe((!self.refreshing).then_some(Message::Refresh))
            .style(button::secondary);

        let spaces = Column::with_children(self.state.study_spaces().iter().map(|space| {
            button(
                row![
                    column![
                        text(space.name.as_str()).size(16),
                        text(space.building.as_str()).size(12),
                    ]
                    .spacing(2),
                    horizontal_space(),
                    status_dot(space.crowd_status),
                    text(space.crowd_status.as_str()),
                ]
                .spacing(8)
                .align_y(Alignment::Center),
            )
            .width(Length::Fill)
            .padding(12)
            .on_press(Message::ShowStudySpace(space.id.clone()))
            .style(button::secondary)
            .into()
        }))
        .spacing(8);

        column![
            row![text("Study Spaces").size(24), horizontal_space(), refresh]
                .align_y(Alignment::Center),
            scrollable(spaces).height(Length::Fill),
        ]
        .spacing(10)
        .into()
    }

    fn view_building_modal(&self, id: &BuildingId) -> Option<Element<Message>> {
        let building = self.state.building(id)?;

        let services = Row::with_children(building.services.iter().map(|service| {
            container(text(service.as_str()).size(12))
                .padding([4, 10])
                .style(container::rounded_box)
                .into()
        }))
        .spacing(6)
        .wrap();

        let mut content = column![
            text(building.name.as_str()).size(24),
            text(building.code.as_str()).size(14),
            text(building.description.as_str()),
            text("Services").size(16),
            services,
        ]
        .spacing(10);

        if !building.image_names.is_empty() {
            content = content.push(text(format!("Photos: {}", building.image_names.join(", "))).size(12));
        }

        let actions = row![
            button("Get Directions").on_press(Message::ShowDirections),
            button("Close")
                .on_press(Message::CloseModal)
                .style(button::secondary),
        ]
        .spacing(10);

        Some(dialog(content.push(actions)))
    }

    fn view_study_modal(&self) -> Option<Element<Message>> {
        let space = self.state.selected_space()?;

        let buttons = Row::with_children(CrowdStatus::REPORTABLE.into_iter().map(|status| {
            let pending = self.pending_status == Some(status);
            button(
                row![status_dot(status), text(status.as_str())]
                    .spacing(6)
                    .align_y(Alignment::Center),
            )
            .on_press_maybe(self.pending_status.is_none().then(|| Message::ReportStatus {
                space_id: space.id.clone(),
                status,
            }))
            .style(move |theme: &Theme, button_status| {
                if pending {
                    button::primary(theme, button_status)
                } else {
                    button::secondary(theme, button_status)
                }
            })
            .into()
        }))
        .spacing(8);

        let content = column![
            text(space.name.as_str()).size(24),
            detail_row("Building", &space.building),
            detail_row("Location", &space.location),
            detail_row("Hours", &space.hours),
            detail_row("Restrictions", &space.restrictions),
            row![
                text("Current status").size(14).width(Length::Fixed(100.0)),
                status_dot(space.crowd_status),
                text(space.crowd_status.as_str())
                    .size(14)
                    .color(status_color(space.crowd_status)),
            ]
            .spacing(6)
            .align_y(Alignment::Center),
            text(format!(
                "Last updated: {}",
                self.state.last_updated_label(space)
            ))
            .size(12),
            text("How busy is it?").size(16),
            buttons,
            button("Close")
                .on_press(Message::CloseModal)
                .style(button::secondary),
        ]
        .spacing(10);

        Some(dialog(content))
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Listener that forwards subscription deliveries into the UI feed
fn forward(
    sender: mpsc::UnboundedSender<Vec<StudySpace>>,
) -> impl Fn(Vec<StudySpace>) + Send + Sync + 'static {
    move |spaces| {
        // The receiver only goes away at shutdown
        let _ = sender.unbounded_send(spaces);
    }
}

fn detail_row<'a>(label: &'static str, value: &'a str) -> Element<'a, Message> {
    row![
        text(label).size(14).width(Length::Fixed(100.0)),
        text(value).size(14),
    ]
    .spacing(6)
    .into()
}

/// Small canvas swatch for a crowd status
fn status_dot<'a>(status: CrowdStatus) -> Element<'a, Message> {
    canvas(StatusDot { status })
        .width(Length::Fixed(12.0))
        .height(Length::Fixed(12.0))
        .into()
}

/// Dialog card shown inside a modal
fn dialog<'a>(content: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    container(content)
        .width(Length::Fixed(440.0))
        .padding(20)
        .style(container::rounded_box)
        .into()
}

/// Lay `content` over a dimmed `base`; clicking outside emits `on_blur`
fn modal<'a>(
    base: impl Into<Element<'a, Message>>,
    content: impl Into<Element<'a, Message>>,
    on_blur: Message,
) -> Element<'a, Message> {
    stack![
        base.into(),
        opaque(
            mouse_area(center(opaque(content)).style(|_theme| container::Style {
                background: Some(
                    Color {
                        a: 0.8,
                        ..Color::BLACK
                    }
                    .into(),
                ),
                ..container::Style::default()
            }))
            .on_press(on_blur)
        )
    ]
    .into()
}

/// Open the configured store, falling back to an in-process one
fn open_store(config: &Config) -> Arc<dyn RemoteStore> {
    match config.store_kind {
        StoreKind::Memory => {
            info!("💾 Using in-process study space store");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Sqlite => match SqliteStore::open(&config.store_path, config.poll_interval) {
            Ok(store) => {
                info!("📂 Shared store at {}", config.store_path.display());
                Arc::new(store)
            }
            Err(e) => {
                error!(
                    "❌ Could not open shared store at {}: {e}; continuing in-process",
                    config.store_path.display()
                );
                Arc::new(MemoryStore::new())
            }
        },
    }
}

fn main() -> iced::Result {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("campus_companion=info")),
        )
        .init();

    iced::application(
        "Campus Companion",
        CampusCompanion::update,
        CampusCompanion::view,
    )
    .subscription(CampusCompanion::subscription)
    .theme(CampusCompanion::theme)
    .exit_on_close_request(false)
    .centered()
    .run_with(CampusCompanion::new)
}
