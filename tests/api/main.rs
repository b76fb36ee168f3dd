mod batch;
mod health_check;
mod helpers;
