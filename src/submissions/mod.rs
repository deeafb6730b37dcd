pub mod commands;
pub mod controller;

pub use commands::{
    download_results, submit_form, submit_manual, submit_upload, view_results, DownloadFile,
    PageResponse, SubmitResponse, SubmittedForm, INDEX_LOCATION, RESULTS_LOCATION,
};
pub use controller::SubmissionController;
