//! `faultline id`: print the id of a fault signature

use faultline_record::{FaultFactory, FaultId};

pub(crate) fn compute(project: &str, exception_type: &str, class: &str, message: &str) -> FaultId {
    FaultFactory::new().compute_id(project, exception_type, class, message)
}

pub(crate) fn run(project: &str, exception_type: &str, class: &str, message: &str) {
    println!("{}", compute(project, exception_type, class, message));
}
