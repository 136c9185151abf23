mod session;

pub use session::{
    DailySummary, Session, SessionStatus, WindowActivity, WindowDetail, WindowDetails,
};
