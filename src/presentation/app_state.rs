// Application state for HTTP handlers
use crate::application::condition_service::ConditionService;
use crate::application::graph_service::GraphService;
use crate::application::isu_service::IsuService;
use crate::application::trend_service::TrendService;

#[derive(Clone)]
pub struct AppState {
    pub isu_service: IsuService,
    pub graph_service: GraphService,
    pub condition_service: ConditionService,
    pub trend_service: TrendService,
}
